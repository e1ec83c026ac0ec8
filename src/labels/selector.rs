//! Budgeted, greedy, collision-free placement of inline marker labels.
//!
//! Candidates are projected to screen space, ranked by a weighted score and
//! then placed one by one into the first free slot around their pin. A
//! candidate whose slots all collide with already accepted labels is dropped.

use crate::{
    core::{
        bounds::{Bounds, ScreenRect},
        camera::Viewport,
        constants::MAX_RATING,
        geo::Point,
    },
    labels::candidate::LabelCandidate,
    prelude::{FxHasher, HashSet},
    traits::ScreenProjector,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::Hasher;

pub const RATING_WEIGHT: f64 = 0.55;
pub const DISTANCE_WEIGHT: f64 = 0.35;
pub const PRIORITY_WEIGHT: f64 = 0.10;

/// Fixed offset variants for a label relative to its pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSlot {
    Below,
    Above,
    Right,
    Left,
}

impl LabelSlot {
    /// Slots in the order they are tried
    pub const ALL: [LabelSlot; 4] = [
        LabelSlot::Below,
        LabelSlot::Above,
        LabelSlot::Right,
        LabelSlot::Left,
    ];

    pub fn penalty(&self) -> f64 {
        match self {
            LabelSlot::Below => 0.0,
            LabelSlot::Above => 0.02,
            LabelSlot::Right => 0.04,
            LabelSlot::Left => 0.06,
        }
    }

    fn code(&self) -> u8 {
        match self {
            LabelSlot::Below => 0,
            LabelSlot::Above => 1,
            LabelSlot::Right => 2,
            LabelSlot::Left => 3,
        }
    }

    /// Label rectangle for a pin whose tip sits at `anchor`
    pub fn rect(&self, anchor: Point, width: f64, height: f64, policy: &LabelPolicy) -> ScreenRect {
        let gap = policy.label_offset_px;
        let half_pin = policy.pin_width_px / 2.0;
        match self {
            LabelSlot::Below => {
                ScreenRect::new(anchor.x - width / 2.0, anchor.y + gap, width, height)
            }
            LabelSlot::Above => ScreenRect::new(
                anchor.x - width / 2.0,
                anchor.y - policy.pin_height_px - gap - height,
                width,
                height,
            ),
            LabelSlot::Right => ScreenRect::new(
                anchor.x + half_pin + gap,
                anchor.y - policy.pin_height_px / 2.0 - height / 2.0,
                width,
                height,
            ),
            LabelSlot::Left => ScreenRect::new(
                anchor.x - half_pin - gap - width,
                anchor.y - policy.pin_height_px / 2.0 - height / 2.0,
                width,
                height,
            ),
        }
    }
}

/// An accepted label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPlacement {
    pub id: String,
    pub slot: LabelSlot,
    pub rect: ScreenRect,
    pub score: f64,
}

/// From `min_zoom` upwards at most `budget` labels are shown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetTier {
    pub min_zoom: f64,
    pub budget: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Below this zoom no labels are laid out
    pub enable_zoom: f64,
    /// Discrete budget steps, evaluated highest `min_zoom` first
    pub budget_tiers: Vec<BudgetTier>,
    /// Circuit breaker: more visible candidates than this disables labels
    pub max_eligible_markers: usize,
    /// Candidates projected within this distance outside the screen still count
    pub screen_margin_px: f64,
    /// Minimum spacing between accepted labels
    pub gap_px: f64,
    /// Score bonus for ids labeled in the previous selection
    pub sticky_bonus: f64,
    pub char_width_px: f64,
    pub label_padding_px: f64,
    pub min_label_width_px: f64,
    pub max_label_width_px: f64,
    pub label_height_px: f64,
    pub pin_width_px: f64,
    pub pin_height_px: f64,
    /// Distance between pin and label
    pub label_offset_px: f64,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            enable_zoom: 15.0,
            budget_tiers: vec![
                BudgetTier {
                    min_zoom: 15.0,
                    budget: 6,
                },
                BudgetTier {
                    min_zoom: 16.0,
                    budget: 10,
                },
                BudgetTier {
                    min_zoom: 17.0,
                    budget: 16,
                },
            ],
            max_eligible_markers: 120,
            screen_margin_px: 24.0,
            gap_px: 4.0,
            sticky_bonus: 0.12,
            char_width_px: 6.5,
            label_padding_px: 6.0,
            min_label_width_px: 36.0,
            max_label_width_px: 160.0,
            label_height_px: 18.0,
            pin_width_px: 28.0,
            pin_height_px: 36.0,
            label_offset_px: 2.0,
        }
    }
}

impl LabelPolicy {
    /// Label budget for a zoom, stepping through the tiers
    pub fn budget_for_zoom(&self, zoom: f64) -> usize {
        if !zoom.is_finite() || zoom < self.enable_zoom {
            return 0;
        }
        self.budget_tiers
            .iter()
            .filter(|tier| zoom >= tier.min_zoom)
            .max_by(|a, b| a.min_zoom.total_cmp(&b.min_zoom))
            .map_or(0, |tier| tier.budget)
    }

    pub fn labels_enabled(&self, zoom: f64, eligible_count: usize) -> bool {
        zoom.is_finite() && zoom >= self.enable_zoom && eligible_count <= self.max_eligible_markers
    }

    /// Pin footprint for a pin whose tip sits at `anchor`
    pub fn pin_rect(&self, anchor: Point) -> ScreenRect {
        ScreenRect::new(
            anchor.x - self.pin_width_px / 2.0,
            anchor.y - self.pin_height_px,
            self.pin_width_px,
            self.pin_height_px,
        )
    }
}

/// Per-frame inputs besides the candidates
pub struct LabelContext<'a> {
    pub viewport: &'a Viewport,
    pub projector: &'a dyn ScreenProjector,
    /// Ids labeled in the previous selection
    pub sticky: &'a HashSet<String>,
    /// Ids that must be labeled if they are on screen, in priority order
    pub forced: &'a [String],
}

struct Ranked<'a> {
    candidate: &'a LabelCandidate,
    anchor: Point,
    score: f64,
    forced_rank: Option<usize>,
}

fn compare_ranked(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    match (a.forced_rank, b.forced_rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b
            .score
            .total_cmp(&a.score)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id)),
    }
}

/// Runs one label selection.
///
/// A label's collision footprint is its text rectangle together with its own
/// pin, so two pins that touch can never both carry a label.
pub fn select_labels(
    candidates: &[LabelCandidate],
    ctx: &LabelContext<'_>,
    policy: &LabelPolicy,
) -> Vec<LabelPlacement> {
    let viewport = ctx.viewport;
    if candidates.is_empty() || viewport.size.is_empty() {
        return Vec::new();
    }

    let area: Bounds = viewport.size.bounds().expanded(policy.screen_margin_px.max(0.0));
    let visible: Vec<(&LabelCandidate, Point)> = candidates
        .iter()
        .filter_map(|candidate| {
            let point = ctx.projector.project(&candidate.id, &candidate.coordinate)?;
            (point.is_finite() && area.contains(&point)).then_some((candidate, point))
        })
        .collect();

    let zoom = viewport.zoom();
    let enabled = policy.labels_enabled(zoom, visible.len());
    let budget = if enabled { policy.budget_for_zoom(zoom) } else { 0 };
    let has_forced = visible
        .iter()
        .any(|(c, _)| ctx.forced.iter().any(|f| f == &c.id));

    if !enabled && !visible.is_empty() {
        log::trace!(
            "labels disabled: zoom {:.2}, {} eligible (ceiling {})",
            zoom,
            visible.len(),
            policy.max_eligible_markers
        );
    }
    if budget == 0 && !has_forced {
        return Vec::new();
    }

    let max_priority = visible
        .iter()
        .map(|(c, _)| c.priority)
        .fold(0.0_f64, f64::max);
    let half_diagonal = viewport.size.half_diagonal().max(1.0);
    let center = viewport.size.center();

    let mut ranked: Vec<Ranked<'_>> = visible
        .into_iter()
        .filter_map(|(candidate, anchor)| {
            let forced_rank = ctx.forced.iter().position(|f| f == &candidate.id);
            // Without a budget only forced ids are laid out
            if budget == 0 && forced_rank.is_none() {
                return None;
            }

            let rating = candidate.rating.unwrap_or(0.0).clamp(0.0, MAX_RATING) / MAX_RATING;
            let proximity = 1.0 - (anchor.distance_to(&center) / half_diagonal).min(1.0);
            let priority = if max_priority > 0.0 {
                (candidate.priority / max_priority).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut score = RATING_WEIGHT * rating
                + DISTANCE_WEIGHT * proximity
                + PRIORITY_WEIGHT * priority;
            if ctx.sticky.contains(&candidate.id) {
                score += policy.sticky_bonus;
            }

            Some(Ranked {
                candidate,
                anchor,
                score,
                forced_rank,
            })
        })
        .collect();
    ranked.sort_by(compare_ranked);

    let mut accepted: Vec<LabelPlacement> = Vec::new();
    let mut footprints: Vec<(ScreenRect, ScreenRect)> = Vec::new();
    let mut budgeted = 0usize;

    for entry in ranked {
        let forced = entry.forced_rank.is_some();
        if !forced && budgeted >= budget {
            break;
        }

        let candidate = entry.candidate;
        let pin = policy.pin_rect(entry.anchor);
        let placement = LabelSlot::ALL.iter().find_map(|slot| {
            let rect = slot.rect(
                entry.anchor,
                candidate.estimated_width,
                candidate.estimated_height,
                policy,
            );
            if !rect.is_inside(&area) {
                return None;
            }
            let collides = footprints.iter().any(|(other_rect, other_pin)| {
                rect.overlaps(other_rect, policy.gap_px)
                    || rect.overlaps(other_pin, policy.gap_px)
                    || pin.overlaps(other_rect, policy.gap_px)
                    || pin.overlaps(other_pin, policy.gap_px)
            });
            (!collides).then_some((*slot, rect))
        });

        match placement {
            Some((slot, rect)) => {
                footprints.push((rect, pin));
                accepted.push(LabelPlacement {
                    id: candidate.id.clone(),
                    slot,
                    rect,
                    score: entry.score - slot.penalty(),
                });
                if !forced {
                    budgeted += 1;
                }
            }
            None if forced => {
                log::debug!("forced label {} has no free slot", candidate.id);
            }
            None => {}
        }
    }

    accepted
}

/// Content hash of a selection: ids, slots and whole-pixel rects, order-independent
pub fn placement_hash(placements: &[LabelPlacement]) -> u64 {
    let mut sorted: Vec<&LabelPlacement> = placements.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = FxHasher::default();
    hasher.write_usize(sorted.len());
    for placement in sorted {
        hasher.write(placement.id.as_bytes());
        hasher.write_u8(placement.slot.code());
        hasher.write_i64(placement.rect.left.round() as i64);
        hasher.write_i64(placement.rect.top.round() as i64);
        hasher.write_i64(placement.rect.width.round() as i64);
        hasher.write_i64(placement.rect.height.round() as i64);
    }
    hasher.finish()
}

/// Result of a stateful selection pass
#[derive(Debug, Clone, PartialEq)]
pub struct LabelUpdate {
    pub placements: Vec<LabelPlacement>,
    pub hash: u64,
    /// False when the selection is identical to the committed one
    pub changed: bool,
}

/// Label selection with stickiness and forced ids carried across frames
#[derive(Debug, Clone)]
pub struct LabelSelector {
    policy: LabelPolicy,
    sticky: HashSet<String>,
    forced: Vec<String>,
    placements: Vec<LabelPlacement>,
    hash: u64,
}

impl LabelSelector {
    pub fn new(policy: LabelPolicy) -> Self {
        Self {
            policy,
            sticky: HashSet::default(),
            forced: Vec::new(),
            placements: Vec::new(),
            hash: placement_hash(&[]),
        }
    }

    pub fn policy(&self) -> &LabelPolicy {
        &self.policy
    }

    /// Currently committed placements
    pub fn placements(&self) -> &[LabelPlacement] {
        &self.placements
    }

    pub fn sticky_ids(&self) -> &HashSet<String> {
        &self.sticky
    }

    /// Makes `id` the forced label, e.g. after its marker was tapped
    pub fn force(&mut self, id: impl Into<String>) {
        self.forced = vec![id.into()];
    }

    pub fn clear_forced(&mut self) {
        self.forced.clear();
    }

    pub fn forced(&self) -> &[String] {
        &self.forced
    }

    /// Selects labels for this frame and commits them if the content hash changed
    pub fn update(
        &mut self,
        candidates: &[LabelCandidate],
        viewport: &Viewport,
        projector: &dyn ScreenProjector,
    ) -> LabelUpdate {
        let ctx = LabelContext {
            viewport,
            projector,
            sticky: &self.sticky,
            forced: &self.forced,
        };
        let placements = select_labels(candidates, &ctx, &self.policy);
        let hash = placement_hash(&placements);
        let changed = hash != self.hash;

        if changed {
            log::trace!("label selection changed: {} labels", placements.len());
            self.sticky = placements.iter().map(|p| p.id.clone()).collect();
            self.hash = hash;
            self.placements = placements.clone();
        }

        LabelUpdate {
            placements: self.placements.clone(),
            hash: self.hash,
            changed,
        }
    }

    /// Drops all committed state, e.g. when leaving single mode
    pub fn reset(&mut self) {
        self.sticky.clear();
        self.placements.clear();
        self.hash = placement_hash(&[]);
    }
}

impl Default for LabelSelector {
    fn default() -> Self {
        Self::new(LabelPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        camera::{Camera, ScreenSize},
        geo::LatLng,
    };

    /// Projector with fixed screen points per id
    struct Fixed(Vec<(&'static str, Point)>);

    impl ScreenProjector for Fixed {
        fn project(&self, id: &str, _coordinate: &LatLng) -> Option<Point> {
            self.0.iter().find(|(i, _)| *i == id).map(|(_, p)| *p)
        }
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport::new(Camera::new(LatLng::new(0.0, 0.0), zoom), ScreenSize::new(400.0, 800.0))
    }

    fn candidate(id: &str, rating: f64, width: f64) -> LabelCandidate {
        LabelCandidate {
            id: id.to_string(),
            coordinate: LatLng::new(0.0, 0.0),
            title: id.to_string(),
            estimated_width: width,
            estimated_height: 18.0,
            priority: 0.0,
            rating: Some(rating),
        }
    }

    fn run(
        candidates: &[LabelCandidate],
        projector: &Fixed,
        zoom: f64,
        forced: &[String],
    ) -> Vec<LabelPlacement> {
        let vp = viewport(zoom);
        let sticky = HashSet::default();
        let ctx = LabelContext {
            viewport: &vp,
            projector,
            sticky: &sticky,
            forced,
        };
        select_labels(candidates, &ctx, &LabelPolicy::default())
    }

    #[test]
    fn test_budget_tiers_are_discrete() {
        let policy = LabelPolicy::default();
        assert_eq!(policy.budget_for_zoom(14.9), 0);
        assert_eq!(policy.budget_for_zoom(15.0), 6);
        assert_eq!(policy.budget_for_zoom(15.99), 6);
        assert_eq!(policy.budget_for_zoom(16.5), 10);
        assert_eq!(policy.budget_for_zoom(19.0), 16);
    }

    #[test]
    fn test_near_pins_get_one_label() {
        let candidates = vec![candidate("a", 4.5, 120.0), candidate("b", 3.0, 120.0)];
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(205.0, 400.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &[]);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].id, "a");
        assert_eq!(placed[0].slot, LabelSlot::Below);
    }

    #[test]
    fn test_falls_back_to_next_slot() {
        // b's pin sits clear of a's label
        let candidates = vec![candidate("a", 5.0, 100.0), candidate("b", 1.0, 100.0)];
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(200.0, 480.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &[]);
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].slot, LabelSlot::Below);

        // Closer: b's pin now overlaps a's label footprint, so b is dropped
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(200.0, 440.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &[]);
        assert_eq!(placed.len(), 1);
    }

    #[test]
    fn test_side_slot_used_when_below_blocked() {
        let candidates = vec![candidate("a", 5.0, 60.0), candidate("b", 1.0, 60.0)];
        // b is 60px to the right, its below-slot touches a's label
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(260.0, 400.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &[]);
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].slot, LabelSlot::Above);
    }

    #[test]
    fn test_circuit_breaker_disables_labels() {
        let policy = LabelPolicy {
            max_eligible_markers: 1,
            ..LabelPolicy::default()
        };
        let vp = viewport(16.0);
        let candidates = vec![candidate("a", 5.0, 60.0), candidate("b", 1.0, 60.0)];
        let projector = Fixed(vec![
            ("a", Point::new(100.0, 200.0)),
            ("b", Point::new(300.0, 600.0)),
        ]);
        let sticky = HashSet::default();
        let ctx = LabelContext {
            viewport: &vp,
            projector: &projector,
            sticky: &sticky,
            forced: &[],
        };
        assert!(select_labels(&candidates, &ctx, &policy).is_empty());
    }

    #[test]
    fn test_forced_label_wins_over_higher_score() {
        let candidates = vec![candidate("a", 5.0, 120.0), candidate("b", 0.0, 120.0)];
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(205.0, 400.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &["b".to_string()]);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].id, "b");
    }

    #[test]
    fn test_forced_label_shown_below_enable_zoom() {
        let candidates = vec![candidate("a", 5.0, 120.0), candidate("b", 0.0, 120.0)];
        let projector = Fixed(vec![
            ("a", Point::new(100.0, 200.0)),
            ("b", Point::new(300.0, 600.0)),
        ]);
        let placed = run(&candidates, &projector, 12.0, &["b".to_string()]);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].id, "b");
    }

    #[test]
    fn test_offscreen_candidates_ignored() {
        let candidates = vec![candidate("a", 5.0, 60.0)];
        let projector = Fixed(vec![("a", Point::new(-200.0, 400.0))]);
        assert!(run(&candidates, &projector, 16.0, &[]).is_empty());
    }

    #[test]
    fn test_ties_broken_by_id() {
        let candidates = vec![candidate("b", 3.0, 120.0), candidate("a", 3.0, 120.0)];
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(200.0, 400.0)),
        ]);
        let placed = run(&candidates, &projector, 16.0, &[]);
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].id, "a");
    }

    #[test]
    fn test_sticky_bonus_keeps_previous_winner() {
        let vp = viewport(16.0);
        let candidates = vec![candidate("a", 3.0, 120.0), candidate("b", 3.2, 120.0)];
        let projector = Fixed(vec![
            ("a", Point::new(200.0, 400.0)),
            ("b", Point::new(205.0, 400.0)),
        ]);
        let mut sticky = HashSet::default();
        sticky.insert("a".to_string());
        let ctx = LabelContext {
            viewport: &vp,
            projector: &projector,
            sticky: &sticky,
            forced: &[],
        };
        let placed = select_labels(&candidates, &ctx, &LabelPolicy::default());
        assert_eq!(placed[0].id, "a");
    }

    #[test]
    fn test_selector_reports_unchanged_selection() {
        let vp = viewport(16.0);
        let candidates = vec![candidate("a", 3.0, 80.0), candidate("b", 4.0, 80.0)];
        let projector = Fixed(vec![
            ("a", Point::new(100.0, 200.0)),
            ("b", Point::new(300.0, 600.0)),
        ]);
        let mut selector = LabelSelector::default();

        let first = selector.update(&candidates, &vp, &projector);
        assert!(first.changed);
        assert_eq!(first.placements.len(), 2);

        let second = selector.update(&candidates, &vp, &projector);
        assert!(!second.changed);
        assert_eq!(first.hash, second.hash);
        assert!(selector.sticky_ids().contains("a"));
    }
}
