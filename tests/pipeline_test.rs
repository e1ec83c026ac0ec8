#[cfg(test)]
mod pipeline_tests {
    use instant::Instant;
    use poi_markers::{
        render::pool::PoolConfig, Camera, DisplayMode, FilterStore, LatLng, MarkerPipeline,
        MarkerPoint, ModeTrigger, PipelineOptions, ScreenSize,
    };
    use std::time::Duration;

    const CENTER: LatLng = LatLng {
        lat: 48.0018,
        lng: 11.00135,
    };

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

    fn pipeline() -> MarkerPipeline {
        let options = PipelineOptions {
            pool: PoolConfig { pool_size: 16 },
            ..PipelineOptions::default()
        };
        let mut pipeline = MarkerPipeline::new(options).unwrap();
        pipeline.on_layout_changed(ScreenSize::new(400.0, 800.0));
        pipeline.on_markers_changed(markers());
        pipeline
    }

    /// Gesture ticks inside the throttle interval coalesce into one later recompute
    #[test]
    fn test_gesture_ticks_are_coalesced() {
        let mut p = pipeline();
        let t0 = Instant::now();
        p.on_camera_changed(Camera::new(CENTER, 12.0), ModeTrigger::ViewReady, t0);

        assert!(p.on_gesture_tick(Camera::new(CENTER, 12.1), t0).is_some());
        let ms = Duration::from_millis;
        assert!(p.on_gesture_tick(Camera::new(CENTER, 12.2), t0 + ms(10)).is_none());
        assert!(p.on_gesture_tick(Camera::new(CENTER, 12.3), t0 + ms(50)).is_none());
        assert_eq!(p.gesture_deadline(), Some(t0 + Duration::from_millis(120)));

        assert!(p.poll_gesture(t0 + Duration::from_millis(100)).is_none());
        let frame = p.poll_gesture(t0 + Duration::from_millis(120)).unwrap();
        assert_eq!(frame.generation, p.generation());
        assert_eq!(p.camera().unwrap().zoom, 12.3);
        assert!(p.poll_gesture(t0 + Duration::from_millis(500)).is_none());
    }

    /// Zooming past the threshold mid-gesture does not switch until the camera settles
    #[test]
    fn test_mode_waits_for_settle() {
        let mut p = pipeline();
        let t0 = Instant::now();
        p.on_camera_changed(Camera::new(CENTER, 12.0), ModeTrigger::ViewReady, t0);

        let frame = p
            .on_camera_changed(
                Camera::new(CENTER, 16.5),
                ModeTrigger::GestureTick,
                t0 + Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Cluster);

        let frame = p
            .on_camera_changed(
                Camera::new(CENTER, 16.5),
                ModeTrigger::CameraSettled,
                t0 + Duration::from_secs(2),
            )
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Single);
        assert_eq!(frame.visible_count, 10);
        assert!(!frame.labels.is_empty());
    }

    /// Filter changes regroup the markers and produce a new frame
    #[test]
    fn test_filters_reduce_markers() {
        let mut p = pipeline();
        p.on_camera_changed(Camera::new(CENTER, 17.0), ModeTrigger::ViewReady, Instant::now());

        let mut store = FilterStore::new();
        store.set_min_rating(Some(3.0));
        let frame = p.on_filters_changed(&store);
        assert_eq!(frame.visible_count, 4);
        assert!(frame.labels.iter().all(|l| ["m6", "m7", "m8", "m9"].contains(&l.id.as_str())));

        store.clear();
        let frame = p.on_filters_changed(&store);
        assert_eq!(frame.visible_count, 10);
    }

    /// A pressed marker is drawn on top and keeps its label
    #[test]
    fn test_marker_press_selects() {
        let mut p = pipeline();
        p.on_camera_changed(Camera::new(CENTER, 17.0), ModeTrigger::ViewReady, Instant::now());

        let frame = p.on_marker_pressed("m0");
        assert_eq!(p.selected(), Some("m0"));
        assert!(frame.labels.iter().any(|l| l.id == "m0"));

        let top = frame.items.iter().max_by_key(|item| item.z_index).unwrap();
        assert_eq!(top.marker_id.as_deref(), Some("m0"));
        assert!(top.selected);

        let frame = p.clear_selection();
        assert!(frame.items.iter().all(|item| !item.selected));
    }

    /// Invalid camera reports are ignored without bumping the generation
    #[test]
    fn test_invalid_camera_ignored() {
        let mut p = pipeline();
        p.on_camera_changed(Camera::new(CENTER, 14.0), ModeTrigger::ViewReady, Instant::now());
        let generation = p.generation();

        let bad = Camera::new(LatLng::new(f64::NAN, 11.0), 14.0);
        assert!(p.on_camera_changed(bad, ModeTrigger::CameraSettled, Instant::now()).is_none());
        assert_eq!(p.generation(), generation);
        assert_eq!(p.camera().unwrap().center, CENTER);
    }

    /// Huge marker weights cap the cluster count instead of overflowing
    #[test]
    fn test_saturated_weights_cluster() {
        let mut p = pipeline();
        p.on_markers_changed(vec![
            MarkerPoint::new("a", CENTER).with_weight(u32::MAX),
            MarkerPoint::new("b", CENTER).with_weight(u32::MAX),
            MarkerPoint::new("c", LatLng::new(CENTER.lat, CENTER.lng + 0.0005)).with_weight(7),
        ]);

        let frame = p
            .on_camera_changed(Camera::new(CENTER, 12.0), ModeTrigger::ViewReady, Instant::now())
            .unwrap();
        assert_eq!(frame.display_mode, DisplayMode::Cluster);
        assert_eq!(frame.visible_count, 1);
        assert_eq!(p.buckets().len(), 1);
        assert_eq!(p.buckets()[0].count_raw, u32::MAX);
    }

    /// New options resize the pool; invalid ones are rejected and change nothing
    #[test]
    fn test_set_options() {
        let mut p = pipeline();
        p.on_camera_changed(Camera::new(CENTER, 17.0), ModeTrigger::ViewReady, Instant::now());

        let smaller = PipelineOptions {
            pool: PoolConfig { pool_size: 4 },
            ..PipelineOptions::default()
        };
        let frame = p.set_options(smaller).unwrap();
        assert_eq!(frame.items.len(), 4);
        assert_eq!(frame.visible_count, 4);

        let invalid = PipelineOptions {
            pool: PoolConfig { pool_size: 0 },
            ..PipelineOptions::default()
        };
        assert!(p.set_options(invalid).is_err());
        assert_eq!(p.options().pool.pool_size, 4);
    }

    /// Every frame keeps the pool length, and markers keep their slots while the camera pans
    #[test]
    fn test_slots_stable_while_panning() {
        let mut p = pipeline();
        let t0 = Instant::now();
        let first = p
            .on_camera_changed(Camera::new(CENTER, 17.0), ModeTrigger::ViewReady, t0)
            .unwrap();

        let panned = LatLng::new(CENTER.lat + 0.0001, CENTER.lng);
        let second = p
            .on_camera_changed(
                Camera::new(panned, 17.0),
                ModeTrigger::CameraSettled,
                t0 + Duration::from_secs(1),
            )
            .unwrap();

        assert_eq!(first.items.len(), 16);
        assert_eq!(second.items.len(), 16);
        for (a, b) in first.items.iter().zip(&second.items) {
            assert_eq!(a.marker_id, b.marker_id);
        }
        assert_eq!(second.stats.pool.churn(), 0);
    }
}
