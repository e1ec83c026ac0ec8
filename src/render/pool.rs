//! Fixed-size marker-slot pool.
//!
//! The host view always receives exactly `pool_size` render items. Logical
//! markers keep their slot for as long as they stay desired; new markers take
//! the lowest free slot, and unused slots carry inert placeholders.

use crate::{
    core::geo::LatLng,
    prelude::{HashMap, HashSet},
    render::builder::{MarkerVisual, RenderItem},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of physical annotations mounted in the host view
    pub pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { pool_size: 64 }
    }
}

/// Slot → marker id assignment carried from one frame to the next
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolState {
    slots: Vec<Option<String>>,
}

impl PoolState {
    pub fn with_size(pool_size: usize) -> Self {
        Self {
            slots: vec![None; pool_size],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.as_deref() == Some(id))
    }

    pub fn id_at(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    /// Occupied slots as `(slot, id)` pairs in slot order
    pub fn assignments(&self) -> impl Iterator<Item = (usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|id| (i, id)))
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Churn counters for one assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Ids that kept their slot
    pub reused: usize,
    /// Ids that claimed a free slot
    pub assigned: usize,
    /// Previously assigned ids that left the pool
    pub released: usize,
    /// Desired ids cut by the pool size
    pub capped: usize,
}

impl PoolStats {
    pub fn churn(&self) -> usize {
        self.assigned + self.released
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolAssignment {
    /// Exactly `pool_size` items, indexed by slot
    pub slots: Vec<RenderItem>,
    /// Number of non-placeholder slots
    pub visible_count: usize,
    pub state: PoolState,
    pub stats: PoolStats,
}

/// What the overflow cap looks at when ranking one desired item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapKey<'a> {
    pub id: &'a str,
    pub coordinate: LatLng,
    pub selected: bool,
}

impl<'a> CapKey<'a> {
    fn of(visual: &'a MarkerVisual) -> Self {
        Self {
            id: &visual.id,
            coordinate: visual.coordinate,
            selected: visual.selected,
        }
    }

    /// Degrees squared from `center`, taking the short way around the antimeridian
    fn distance_sq(&self, center: &LatLng) -> f64 {
        let dlat = self.coordinate.lat - center.lat;
        let dlng = LatLng::wrap_lng(self.coordinate.lng - center.lng);
        dlat * dlat + dlng * dlng
    }

    /// Selected first, then nearest to `center`, then id
    fn rank(&self, other: &Self, center: &LatLng) -> Ordering {
        other
            .selected
            .cmp(&self.selected)
            .then_with(|| self.distance_sq(center).total_cmp(&other.distance_sq(center)))
            .then_with(|| self.id.cmp(other.id))
    }
}

/// Ids that survive the overflow cap, or `None` when every key fits.
///
/// Uses the same ranking as [`assign`], so stages ahead of the pool can skip
/// work for items the pool is going to drop.
pub fn surviving_ids<'a>(
    mut keys: Vec<CapKey<'a>>,
    pool_size: usize,
    center: &LatLng,
) -> Option<HashSet<&'a str>> {
    let mut seen: HashSet<&str> = HashSet::default();
    keys.retain(|key| seen.insert(key.id));
    if keys.len() <= pool_size {
        return None;
    }
    keys.sort_by(|a, b| a.rank(b, center));
    keys.truncate(pool_size);
    Some(keys.into_iter().map(|key| key.id).collect())
}

/// Maps `desired` onto `pool_size` slots, keeping the slots of `previous` where possible.
///
/// When more ids are desired than slots exist, the selected item and then the
/// items nearest to `center` are kept. New ids are placed in id order into the
/// lowest free slots, so the result depends only on the desired set.
pub fn assign(
    desired: &[MarkerVisual],
    pool_size: usize,
    previous: &PoolState,
    center: &LatLng,
) -> PoolAssignment {
    let mut seen: HashSet<&str> = HashSet::default();
    let mut unique: Vec<&MarkerVisual> = desired
        .iter()
        .filter(|visual| seen.insert(visual.id.as_str()))
        .collect();

    let mut stats = PoolStats::default();
    if unique.len() > pool_size {
        unique.sort_by(|a, b| CapKey::of(a).rank(&CapKey::of(b), center));
        stats.capped = unique.len() - pool_size;
        unique.truncate(pool_size);
    }

    let by_id: HashMap<&str, &MarkerVisual> = unique.iter().map(|v| (v.id.as_str(), *v)).collect();

    let mut slots: Vec<Option<String>> = vec![None; pool_size];
    for (slot, id) in previous.assignments() {
        if slot < pool_size && by_id.contains_key(id) {
            slots[slot] = Some(id.to_string());
            stats.reused += 1;
        } else {
            stats.released += 1;
        }
    }

    let placed: HashSet<&str> = slots.iter().filter_map(|s| s.as_deref()).collect();
    let mut incoming: Vec<&str> = unique
        .iter()
        .map(|v| v.id.as_str())
        .filter(|id| !placed.contains(id))
        .collect();
    incoming.sort_unstable();

    let mut free = (0..pool_size).filter(|&i| slots[i].is_none()).collect::<Vec<_>>().into_iter();
    for id in incoming {
        match free.next() {
            Some(slot) => {
                slots[slot] = Some(id.to_string());
                stats.assigned += 1;
            }
            None => break,
        }
    }

    let items: Vec<RenderItem> = slots
        .iter()
        .enumerate()
        .map(|(slot, id)| {
            id.as_deref()
                .and_then(|id| by_id.get(id))
                .map_or_else(
                    || RenderItem::placeholder(slot),
                    |visual| RenderItem::from_visual(slot, visual),
                )
        })
        .collect();
    let visible_count = items.iter().filter(|item| !item.is_placeholder()).count();

    if stats.churn() > 0 || stats.capped > 0 {
        log::debug!(
            "pool: {} visible, {} reused, {} assigned, {} released, {} capped",
            visible_count,
            stats.reused,
            stats.assigned,
            stats.released,
            stats.capped
        );
    }

    PoolAssignment {
        slots: items,
        visible_count,
        state: PoolState { slots },
        stats,
    }
}

/// Pool that keeps its own state between frames
#[derive(Debug, Clone)]
pub struct MarkerSlotPool {
    config: PoolConfig,
    state: PoolState,
}

impl MarkerSlotPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            state: PoolState::with_size(config.pool_size),
            config,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// Assigns this frame's visuals and commits the new slot state
    pub fn update(&mut self, desired: &[MarkerVisual], center: &LatLng) -> PoolAssignment {
        let assignment = assign(desired, self.config.pool_size, &self.state, center);
        self.state = assignment.state.clone();
        assignment
    }

    /// Resizes the pool; ids in slots past the new size are released next frame
    pub fn set_config(&mut self, config: PoolConfig) {
        self.config = config;
    }

    pub fn reset(&mut self) {
        self.state = PoolState::with_size(self.config.pool_size);
    }
}

impl Default for MarkerSlotPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
