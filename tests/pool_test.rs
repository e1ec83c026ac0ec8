#[cfg(test)]
mod pool_tests {
    use poi_markers::{
        render::{
            builder::{slot_key, Anchor, MarkerVisual},
            pool::{assign, MarkerSlotPool, PoolConfig, PoolState},
            sprites::ImageRef,
        },
        LatLng,
    };

    fn visual(id: &str, lng: f64) -> MarkerVisual {
        let coordinate = LatLng::new(0.0, lng);
        MarkerVisual {
            id: id.to_string(),
            coordinate,
            image: ImageRef::Generated {
                key: format!("icon-{id}"),
            },
            anchor: Anchor::PIN,
            z_index: 10,
            is_cluster: false,
            is_stacked: false,
            focus_coordinate: coordinate,
            count: 1,
            labeled: false,
            selected: false,
        }
    }

    fn frame(ids: &[&str]) -> Vec<MarkerVisual> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| visual(id, i as f64 * 0.01))
            .collect()
    }

    fn ids_by_slot(pool: &MarkerSlotPool) -> Vec<Option<String>> {
        (0..pool.pool_size())
            .map(|slot| pool.state().id_at(slot).map(str::to_string))
            .collect()
    }

    const CENTER: LatLng = LatLng { lat: 0.0, lng: 0.0 };

    /// Every frame emits exactly `pool_size` items with stable slot keys
    #[test]
    fn test_output_length_is_constant() {
        let mut pool = MarkerSlotPool::new(PoolConfig { pool_size: 8 });
        let frames: [&[&str]; 4] = [
            &["a"],
            &["a", "b", "c"],
            &[],
            &["d", "e", "f", "g", "h", "i", "j", "k", "l"],
        ];
        for ids in frames {
            let assignment = pool.update(&frame(ids), &CENTER);
            assert_eq!(assignment.slots.len(), 8);
            for (slot, item) in assignment.slots.iter().enumerate() {
                assert_eq!(item.slot, slot);
                assert_eq!(item.key, slot_key(slot));
            }
            assert_eq!(assignment.visible_count, ids.len().min(8));
        }
    }

    /// Surviving ids keep their slot, new ids fill the lowest free slots
    #[test]
    fn test_exact_slots_across_frames() {
        let mut pool = MarkerSlotPool::new(PoolConfig { pool_size: 4 });

        pool.update(&frame(&["c", "a", "b"]), &CENTER);
        assert_eq!(
            ids_by_slot(&pool),
            vec![Some("a".into()), Some("b".into()), Some("c".into()), None]
        );

        let second = pool.update(&frame(&["e", "b", "d", "c"]), &CENTER);
        assert_eq!(
            ids_by_slot(&pool),
            vec![Some("d".into()), Some("b".into()), Some("c".into()), Some("e".into())]
        );
        assert_eq!(second.stats.reused, 2);
        assert_eq!(second.stats.assigned, 2);
        assert_eq!(second.stats.released, 1);

        pool.update(&frame(&["f", "e"]), &CENTER);
        assert_eq!(ids_by_slot(&pool), vec![Some("f".into()), None, None, Some("e".into())]);
    }

    /// The same sequence of desired sets gives the same slots regardless of input order
    #[test]
    fn test_deterministic_across_runs() {
        let frames: Vec<Vec<&str>> = vec![
            vec!["m1", "m2", "m3", "m4"],
            vec!["m3", "m5", "m6"],
            vec!["m6", "m7", "m1", "m2", "m3"],
        ];

        let mut forward = MarkerSlotPool::new(PoolConfig { pool_size: 6 });
        let mut backward = MarkerSlotPool::new(PoolConfig { pool_size: 6 });
        for ids in &frames {
            let a = forward.update(&frame(ids), &CENTER);
            let mut reversed = ids.clone();
            reversed.reverse();
            let b = backward.update(&frame(&reversed), &CENTER);

            let a_ids: Vec<_> = a.slots.iter().map(|item| item.marker_id.clone()).collect();
            let b_ids: Vec<_> = b.slots.iter().map(|item| item.marker_id.clone()).collect();
            assert_eq!(a_ids, b_ids);
        }
        assert_eq!(forward.state(), backward.state());
    }

    /// Overflow keeps the selected item and then the items nearest the center
    #[test]
    fn test_overflow_prefers_selected_then_nearest() {
        let mut desired: Vec<MarkerVisual> = (0..6)
            .map(|i| visual(&format!("p{i}"), i as f64))
            .collect();
        desired[5].selected = true;

        let assignment = assign(&desired, 3, &PoolState::with_size(3), &CENTER);
        assert_eq!(assignment.stats.capped, 3);

        let mut kept: Vec<String> = assignment
            .slots
            .iter()
            .filter_map(|item| item.marker_id.clone())
            .collect();
        kept.sort();
        assert_eq!(kept, vec!["p0", "p1", "p5"]);
    }

    /// Duplicate ids in one frame occupy a single slot
    #[test]
    fn test_duplicate_ids_collapse() {
        let desired = vec![visual("x", 0.0), visual("x", 1.0), visual("y", 2.0)];
        let assignment = assign(&desired, 4, &PoolState::with_size(4), &CENTER);
        assert_eq!(assignment.visible_count, 2);
        assert_eq!(assignment.state.occupied(), 2);
    }
}
