//! Event-driven marker pipeline.
//!
//! The host reports discrete events (markers changed, camera moved, layout
//! changed, presses). Each event updates the versioned input state and, unless
//! throttled, synchronously produces a new [`Frame`].

use crate::{
    core::{
        camera::{self, Camera, ScreenSize, Viewport},
        config::{PerformanceProfile, PipelineOptions},
        constants::{MAX_ZOOM, MIN_ZOOM},
        geo::LatLng,
    },
    data::{
        filter::{FilterState, FilterStore},
        grouping::{group_by_location, LocationGroup},
        marker::{sanitize, MarkerPoint},
    },
    display::mode::{DisplayMode, DisplayModeController, ModeTrigger},
    labels::{
        candidate::candidates_from_groups,
        selector::{LabelPlacement, LabelSelector},
    },
    pipeline::{
        generation::VersionedState,
        projection::{
            AsyncInbox, CachedProjector, NativeProjectionCache, ProjectionRequest,
            ProjectionResult,
        },
        throttle::GestureThrottle,
    },
    prelude::HashSet,
    render::{
        builder::{build_cluster_visuals, build_single_visuals, MarkerVisual, RenderItem},
        pool::{surviving_ids, CapKey, MarkerSlotPool, PoolStats},
        sprites::{PrefetchOutcome, PrefetchRequest, SpriteResolver},
    },
    spatial::{
        clustering::{ClusterBucket, ClusterPoint, Clustering},
        culling::Culling,
    },
    traits::HostMapView,
    MarkerError, Result,
};
use crossbeam_channel::Sender;
use instant::Instant;
use serde::{Deserialize, Serialize};

/// Per-frame diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub input_markers: usize,
    pub groups: usize,
    /// Cluster buckets before culling; zero in single mode
    pub buckets: usize,
    /// Logical items left after culling
    pub culled: usize,
    pub labels: usize,
    pub label_hash: u64,
    pub labels_changed: bool,
    pub pool: PoolStats,
    /// Labels were placed with host-measured points
    pub native_projection: bool,
}

/// Everything the host view needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub generation: u64,
    pub display_mode: DisplayMode,
    /// Exactly `pool_size` items
    pub items: Vec<RenderItem>,
    pub labels: Vec<LabelPlacement>,
    pub visible_count: usize,
    pub stats: FrameStats,
}

pub struct MarkerPipeline {
    options: PipelineOptions,
    state: VersionedState,
    filters: FilterState,
    groups: Vec<LocationGroup>,
    mode: DisplayModeController,
    clustering: Clustering,
    buckets: Vec<ClusterBucket>,
    labels: LabelSelector,
    pool: MarkerSlotPool,
    sprites: SpriteResolver,
    throttle: GestureThrottle<u64>,
    projections: NativeProjectionCache,
    projection_inbox: AsyncInbox<ProjectionResult>,
    sprite_inbox: AsyncInbox<Vec<PrefetchOutcome>>,
    selected: Option<String>,
    visible_groups: Vec<LocationGroup>,
    visible_marker_ids: HashSet<String>,
    last_frame: Option<Frame>,
}

impl MarkerPipeline {
    pub fn new(options: PipelineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            state: VersionedState::default(),
            filters: FilterState::default(),
            groups: Vec::new(),
            mode: DisplayModeController::new(options.display_mode.clone()),
            clustering: Clustering::new(options.clustering.clone()),
            buckets: Vec::new(),
            labels: LabelSelector::new(options.labels.clone()),
            pool: MarkerSlotPool::new(options.pool.clone()),
            sprites: SpriteResolver::new(options.sprites.clone()),
            throttle: GestureThrottle::new(options.throttle.interval()),
            projections: NativeProjectionCache::new(),
            projection_inbox: AsyncInbox::new(),
            sprite_inbox: AsyncInbox::new(),
            selected: None,
            visible_groups: Vec::new(),
            visible_marker_ids: HashSet::default(),
            last_frame: None,
            options,
        })
    }

    pub fn with_profile(profile: PerformanceProfile) -> Result<Self> {
        Self::new(profile.resolve())
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.mode.mode()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation()
    }

    pub fn camera(&self) -> Option<Camera> {
        self.state.camera()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Current cluster buckets before culling
    pub fn buckets(&self) -> &[ClusterBucket] {
        &self.buckets
    }

    pub fn sprites_mut(&mut self) -> &mut SpriteResolver {
        &mut self.sprites
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// New marker snapshot from the data layer
    pub fn on_markers_changed(&mut self, markers: Vec<MarkerPoint>) -> Frame {
        let markers = sanitize(&markers);
        self.state.set_markers(markers);
        self.rebuild_groups();
        self.recompute()
    }

    /// Camera report from the host. Continuous ticks are routed through the throttle.
    pub fn on_camera_changed(
        &mut self,
        camera: Camera,
        trigger: ModeTrigger,
        now: Instant,
    ) -> Option<Frame> {
        if !trigger.is_discrete() {
            return self.on_gesture_tick(camera, now);
        }
        self.state.set_camera(camera)?;
        self.throttle.cancel();
        self.mode.evaluate(trigger, camera.zoom, now);
        Some(self.recompute())
    }

    /// A frame of an ongoing gesture. Returns `None` while coalesced.
    pub fn on_gesture_tick(&mut self, camera: Camera, now: Instant) -> Option<Frame> {
        let generation = self.state.set_camera(camera)?;
        self.throttle.schedule(generation, now)?;
        Some(self.recompute())
    }

    /// Releases a coalesced gesture recompute once it is due
    pub fn poll_gesture(&mut self, now: Instant) -> Option<Frame> {
        self.throttle.poll(now)?;
        Some(self.recompute())
    }

    /// When the host should call [`Self::poll_gesture`] next
    pub fn gesture_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    pub fn on_layout_changed(&mut self, size: ScreenSize) -> Frame {
        self.state.set_size(size);
        self.recompute()
    }

    pub fn on_filters_changed(&mut self, store: &FilterStore) -> Frame {
        if store.state() != &self.filters {
            self.filters = store.state().clone();
            self.state.touch();
            self.rebuild_groups();
        }
        self.recompute()
    }

    /// Selects a marker; it is kept on top and its label is forced
    pub fn on_marker_pressed(&mut self, marker_id: &str) -> Frame {
        self.selected = Some(marker_id.to_string());
        self.labels.force(marker_id);
        self.recompute()
    }

    pub fn clear_selection(&mut self) -> Frame {
        self.selected = None;
        self.labels.clear_forced();
        self.recompute()
    }

    /// Camera that frames the members of a cluster, at least one zoom step deeper
    pub fn cluster_press_target(&self, cluster_id: &str) -> Option<Camera> {
        let current = self.state.camera()?;
        let bucket = self.buckets.iter().find(|b| b.id == cluster_id)?;
        let press = &self.options.cluster_press;

        let coordinates: Vec<LatLng> = self
            .groups
            .iter()
            .filter(|group| group.members.iter().any(|m| bucket.contains(&m.id)))
            .map(|group| group.coordinate)
            .collect();
        let region = camera::region_fitting(&coordinates, press.padding_ratio, press.min_span_deg)?;
        let fitted = camera::zoom_for_region(&region, self.state.size());
        let zoom = fitted.max(current.zoom + press.min_zoom_step).clamp(MIN_ZOOM, MAX_ZOOM);

        Some(Camera::new(region.center, zoom))
    }

    /// Zooms into a pressed cluster and re-evaluates the display mode
    pub async fn on_cluster_pressed(
        &mut self,
        host: &dyn HostMapView,
        cluster_id: &str,
        now: Instant,
    ) -> Option<Frame> {
        let target = self.cluster_press_target(cluster_id)?;
        log::debug!(
            "cluster {} pressed, zooming to {:.2} at ({:.5}, {:.5})",
            cluster_id,
            target.zoom,
            target.center.lat,
            target.center.lng
        );

        let duration = self.options.cluster_press.animation();
        if let Err(err) = host.animate_camera(target, duration).await {
            log::debug!("host could not animate camera: {}", err);
        }
        self.on_camera_changed(target, ModeTrigger::ZoomInAction, now)
    }

    /// Native projections to ask the host for, for the current generation
    pub fn projection_request(&mut self) -> Option<ProjectionRequest> {
        if self.mode.mode() != DisplayMode::Single {
            return None;
        }
        let candidates = candidates_from_groups(&self.visible_groups, self.labels.policy());
        let targets: Vec<(String, LatLng)> = candidates
            .into_iter()
            .map(|c| (c.id, c.coordinate))
            .collect();
        if targets.is_empty() {
            return None;
        }
        Some(self.projections.issue(self.state.generation(), targets))
    }

    pub fn projection_sender(&self) -> Sender<ProjectionResult> {
        self.projection_inbox.sender()
    }

    /// Applies host-measured points; stale generations are discarded
    pub fn apply_projection(&mut self, result: ProjectionResult) -> Option<Frame> {
        match self.accept_projection(result) {
            Ok(()) => Some(self.recompute()),
            Err(_) => None,
        }
    }

    fn accept_projection(&mut self, result: ProjectionResult) -> Result<()> {
        if !self.state.is_current(result.generation) {
            let err = MarkerError::StaleGeneration {
                issued: result.generation,
                latest: self.state.generation(),
            };
            log::trace!("{}", err);
            return Err(err);
        }
        match self.projections.apply(result) {
            Ok(count) => {
                log::trace!("applied {} native projections", count);
                Ok(())
            }
            Err(err) => {
                log::trace!("{}", err);
                Err(err)
            }
        }
    }

    /// Remote sprites the visible markers still need
    pub fn sprite_prefetch_request(&mut self) -> Option<PrefetchRequest> {
        let generation = self.state.generation();
        let markers: Vec<&MarkerPoint> = self
            .visible_groups
            .iter()
            .flat_map(|group| group.members.iter())
            .filter(|marker| self.visible_marker_ids.contains(&marker.id))
            .collect();
        self.sprites.prefetch_request(markers, generation)
    }

    pub fn sprite_sender(&self) -> Sender<Vec<PrefetchOutcome>> {
        self.sprite_inbox.sender()
    }

    /// Applies finished downloads; a new frame is produced when a sprite failed
    pub fn apply_sprite_outcomes(&mut self, outcomes: &[PrefetchOutcome]) -> Option<Frame> {
        if self.accept_sprite_outcomes(outcomes) {
            Some(self.recompute())
        } else {
            None
        }
    }

    fn accept_sprite_outcomes(&mut self, outcomes: &[PrefetchOutcome]) -> bool {
        let visible = &self.visible_marker_ids;
        let mut failed = false;
        for outcome in outcomes {
            self.sprites.apply_outcome(outcome, |id| visible.contains(id));
            failed |= outcome.result.is_err();
        }
        failed
    }

    /// Applies everything async work has posted to the inboxes, with at most one recompute
    pub fn drain_async(&mut self) -> Option<Frame> {
        self.absorb_inboxes().then(|| self.recompute())
    }

    fn absorb_inboxes(&mut self) -> bool {
        let mut dirty = false;
        for result in self.projection_inbox.drain() {
            dirty |= self.accept_projection(result).is_ok();
        }
        for outcomes in self.sprite_inbox.drain() {
            dirty |= self.accept_sprite_outcomes(&outcomes);
        }
        dirty
    }

    /// Replaces the options; stateful components restart from scratch
    pub fn set_options(&mut self, options: PipelineOptions) -> Result<Frame> {
        options.validate()?;
        self.mode = DisplayModeController::new(options.display_mode.clone());
        self.clustering.set_config(options.clustering.clone());
        self.labels = LabelSelector::new(options.labels.clone());
        self.pool = MarkerSlotPool::new(options.pool.clone());
        self.throttle.set_interval(options.throttle.interval());
        self.options = options;
        Ok(self.recompute())
    }

    fn rebuild_groups(&mut self) {
        let filtered = self.filters.apply(self.state.markers());
        self.groups = group_by_location(&filtered);
        log::debug!(
            "{} markers, {} after filters, {} locations",
            self.state.markers().len(),
            filtered.len(),
            self.groups.len()
        );
    }

    /// Builds a frame from the latest state
    pub fn recompute(&mut self) -> Frame {
        self.absorb_inboxes();
        let generation = self.state.generation();
        let mut stats = FrameStats {
            input_markers: self.state.markers().len(),
            groups: self.groups.len(),
            ..FrameStats::default()
        };

        let Some(camera) = self.state.camera() else {
            // Nothing can be placed before the first camera report
            let assignment = self.pool.update(&[], &LatLng::default());
            stats.pool = assignment.stats;
            return self.commit(Frame {
                generation,
                display_mode: self.mode.mode(),
                items: assignment.slots,
                labels: Vec::new(),
                visible_count: 0,
                stats,
            });
        };

        if !self.mode.is_initialized() {
            self.mode.initialize(camera.zoom);
        }
        let viewport = Viewport::new(camera, self.state.size());
        let padding = self.options.culling.padding_ratio;
        let selected = self.selected.as_deref();
        let mode = self.mode.mode();

        let (visuals, placements): (Vec<MarkerVisual>, Vec<LabelPlacement>) = match mode {
            DisplayMode::Cluster => {
                let points: Vec<ClusterPoint> =
                    self.groups.iter().map(ClusterPoint::from).collect();
                self.buckets = self.clustering.get_clusters(&points, camera.zoom);
                let visible = Culling::cull(&self.buckets, &viewport, padding);
                self.visible_groups.clear();
                self.labels.reset();

                stats.buckets = self.buckets.len();
                stats.culled = visible.len();
                (build_cluster_visuals(&visible, &self.sprites, selected), Vec::new())
            }
            DisplayMode::Single => {
                self.buckets.clear();
                self.visible_groups = Culling::cull(&self.groups, &viewport, padding);

                // Labels are only spent on markers the pool will keep
                let ids: Vec<String> = self.visible_groups.iter().map(LocationGroup::id).collect();
                let keys = self
                    .visible_groups
                    .iter()
                    .zip(&ids)
                    .map(|(group, id)| CapKey {
                        id: id.as_str(),
                        coordinate: group.coordinate,
                        selected: selected.map_or(false, |s| s == id.as_str() || group.contains(s)),
                    })
                    .collect();
                let kept = surviving_ids(keys, self.pool.pool_size(), &camera.center);
                let mut candidates =
                    candidates_from_groups(&self.visible_groups, self.labels.policy());
                if let Some(kept) = &kept {
                    candidates.retain(|c| kept.contains(c.id.as_str()));
                }
                let native = self.projections.points_for(generation);
                stats.native_projection = native.is_some();
                let projector = CachedProjector::new(native, &viewport);
                let update = self.labels.update(&candidates, &viewport, &projector);
                stats.label_hash = update.hash;
                stats.labels_changed = update.changed;

                stats.culled = self.visible_groups.len();
                let visuals = build_single_visuals(
                    &self.visible_groups,
                    &update.placements,
                    &mut self.sprites,
                    selected,
                );
                (visuals, update.placements)
            }
        };

        let assignment = self.pool.update(&visuals, &camera.center);
        let in_pool: HashSet<&str> = assignment
            .slots
            .iter()
            .filter_map(|item| item.marker_id.as_deref())
            .collect();
        let labels: Vec<LabelPlacement> = placements
            .into_iter()
            .filter(|p| in_pool.contains(p.id.as_str()))
            .collect();

        self.visible_marker_ids = match mode {
            DisplayMode::Cluster => self
                .buckets
                .iter()
                .filter(|b| in_pool.contains(b.id.as_str()))
                .flat_map(|b| b.member_ids.iter().cloned())
                .collect(),
            DisplayMode::Single => self
                .visible_groups
                .iter()
                .filter(|g| in_pool.contains(g.id().as_str()))
                .flat_map(|g| g.member_ids())
                .collect(),
        };

        stats.labels = labels.len();
        stats.pool = assignment.stats;
        let frame = Frame {
            generation,
            display_mode: mode,
            visible_count: assignment.visible_count,
            items: assignment.slots,
            labels,
            stats,
        };
        self.commit(frame)
    }

    fn commit(&mut self, frame: Frame) -> Frame {
        log::trace!(
            "frame {}: {} mode, {} visible, {} labels",
            frame.generation,
            frame.display_mode,
            frame.visible_count,
            frame.labels.len()
        );
        self.last_frame = Some(frame.clone());
        frame
    }
}

impl std::fmt::Debug for MarkerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerPipeline")
            .field("generation", &self.state.generation())
            .field("mode", &self.mode.mode())
            .field("groups", &self.groups.len())
            .field("selected", &self.selected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pool::PoolConfig;
    use std::time::Duration;

    fn pipeline() -> MarkerPipeline {
        let options = PipelineOptions {
            pool: PoolConfig { pool_size: 16 },
            ..PipelineOptions::default()
        };
        let mut pipeline = MarkerPipeline::new(options).unwrap();
        pipeline.on_layout_changed(ScreenSize::new(400.0, 800.0));
        pipeline
    }

    fn markers() -> Vec<MarkerPoint> {
        (0..10)
            .map(|i| {
                let coordinate = LatLng::new(48.0 + i as f64 * 0.0004, 11.0 + i as f64 * 0.0003);
                MarkerPoint::new(format!("m{i}"), coordinate)
                    .with_title(format!("Venue {i}"))
                    .with_rating(i as f64 / 2.0)
            })
            .collect()
    }

    #[test]
    fn test_frame_before_camera_is_all_placeholders() {
        let mut p = pipeline();
        let frame = p.on_markers_changed(markers());
        assert_eq!(frame.items.len(), 16);
        assert_eq!(frame.visible_count, 0);
    }

    #[test]
    fn test_cluster_then_single() {
        let mut p = pipeline();
        p.on_markers_changed(markers());
        let t0 = Instant::now();

        let frame = p
            .on_camera_changed(
                Camera::new(LatLng::new(48.002, 11.0015), 11.0),
                ModeTrigger::ViewReady,
                t0,
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Cluster);
        assert_eq!(frame.items.len(), 16);
        assert!(frame.visible_count >= 1);
        assert!(frame.labels.is_empty());
        let total: u32 = p.buckets().iter().map(|b| b.count_raw).sum();
        assert_eq!(total, 10);

        let frame = p
            .on_camera_changed(
                Camera::new(LatLng::new(48.002, 11.0015), 17.0),
                ModeTrigger::CameraSettled,
                t0 + Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Single);
        assert_eq!(frame.items.len(), 16);
        assert_eq!(frame.visible_count, 10);
        assert!(!frame.labels.is_empty());
    }

    #[test]
    fn test_gesture_ticks_do_not_switch_mode() {
        let mut p = pipeline();
        p.on_markers_changed(markers());
        let t0 = Instant::now();
        p.on_camera_changed(Camera::new(LatLng::new(48.0, 11.0), 11.0), ModeTrigger::ViewReady, t0);

        let frame = p
            .on_gesture_tick(
                Camera::new(LatLng::new(48.0, 11.0), 18.0),
                t0 + Duration::from_secs(2),
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Cluster);

        // Inside the throttle interval: coalesced
        assert!(p
            .on_gesture_tick(
                Camera::new(LatLng::new(48.0, 11.0), 18.1),
                t0 + Duration::from_millis(2010),
            )
            .is_none());
        assert!(p.poll_gesture(t0 + Duration::from_secs(3)).is_some());
    }

    #[test]
    fn test_stale_projection_is_dropped() {
        let mut p = pipeline();
        p.on_markers_changed(markers());
        let t0 = Instant::now();
        p.on_camera_changed(
            Camera::new(LatLng::new(48.002, 11.0015), 17.0),
            ModeTrigger::ViewReady,
            t0,
        );

        let request = p.projection_request().unwrap();
        p.on_camera_changed(
            Camera::new(LatLng::new(48.002, 11.0016), 17.0),
            ModeTrigger::CameraSettled,
            t0 + Duration::from_millis(10),
        );
        let stale = ProjectionResult {
            generation: request.generation,
            points: vec![],
        };
        assert!(p.apply_projection(stale).is_none());
    }

    #[test]
    fn test_marker_press_forces_label_and_selection() {
        let mut p = pipeline();
        p.on_markers_changed(markers());
        p.on_camera_changed(
            Camera::new(LatLng::new(48.002, 11.0015), 17.0),
            ModeTrigger::ViewReady,
            Instant::now(),
        );
        let frame = p.on_marker_pressed("m0");
        assert!(frame.labels.iter().any(|l| l.id == "m0"));
        let item = frame
            .items
            .iter()
            .find(|i| i.marker_id.as_deref() == Some("m0"))
            .unwrap();
        assert!(item.selected);
    }

    #[test]
    fn test_labels_only_on_markers_the_pool_keeps() {
        let options = PipelineOptions {
            pool: PoolConfig { pool_size: 3 },
            ..PipelineOptions::default()
        };
        let mut p = MarkerPipeline::new(options).unwrap();
        p.on_layout_changed(ScreenSize::new(400.0, 800.0));
        p.on_markers_changed(markers());
        let frame = p
            .on_camera_changed(
                Camera::new(LatLng::new(48.002, 11.0015), 17.0),
                ModeTrigger::ViewReady,
                Instant::now(),
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Single);
        assert_eq!(frame.visible_count, 3);
        assert_eq!(frame.stats.pool.capped, 7);

        // Every label the selector committed made it into the frame
        assert!(!frame.labels.is_empty());
        assert_eq!(p.labels.placements(), frame.labels.as_slice());
        let in_pool: Vec<&str> = frame
            .items
            .iter()
            .filter_map(|i| i.marker_id.as_deref())
            .collect();
        assert!(frame.labels.iter().all(|l| in_pool.contains(&l.id.as_str())));
    }

    #[test]
    fn test_cluster_press_target_zooms_in() {
        let mut p = pipeline();
        p.on_markers_changed(markers());
        p.on_camera_changed(
            Camera::new(LatLng::new(48.002, 11.0015), 11.0),
            ModeTrigger::ViewReady,
            Instant::now(),
        );
        let id = p.buckets()[0].id.clone();
        let target = p.cluster_press_target(&id).unwrap();
        assert!(target.zoom >= 12.0);
        assert!(p.cluster_press_target("cluster-missing").is_none());
    }
}
