//! Render-item assembly: image choice, anchor point and z-order for every
//! logical marker, and the fixed-slot records handed to the host view.

use crate::{
    core::{
        constants::{
            CLUSTER_ANCHOR, MAX_RATING, PIN_ANCHOR, PLACEHOLDER_LAT, PLACEHOLDER_LNG,
            PLACEHOLDER_Z_INDEX,
        },
        geo::LatLng,
    },
    data::grouping::LocationGroup,
    labels::selector::LabelPlacement,
    prelude::HashSet,
    render::sprites::{ImageRef, SpriteResolver},
    spatial::clustering::ClusterBucket,
};
use serde::{Deserialize, Serialize};

pub const Z_CLUSTER_BASE: i32 = 1_000;
pub const Z_LABELED_BONUS: i32 = 500;
pub const Z_SELECTED: i32 = 5_000;
const Z_RATING_SCALE: f64 = 10.0;
const Z_MAX_COUNT: u32 = 999;

/// Anchor as a fraction of the image size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    /// Bottom center, for pins
    pub const PIN: Anchor = Anchor {
        x: PIN_ANCHOR.0,
        y: PIN_ANCHOR.1,
    };
    /// Center, for cluster icons
    pub const CENTER: Anchor = Anchor {
        x: CLUSTER_ANCHOR.0,
        y: CLUSTER_ANCHOR.1,
    };
}

/// A logical marker before slot assignment
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerVisual {
    /// Marker id, group id or cluster id; stable across frames
    pub id: String,
    pub coordinate: LatLng,
    pub image: ImageRef,
    pub anchor: Anchor,
    pub z_index: i32,
    pub is_cluster: bool,
    pub is_stacked: bool,
    /// Where a press on this item zooms to
    pub focus_coordinate: LatLng,
    /// Displayed count: cluster weight or number of stacked venues
    pub count: u32,
    pub labeled: bool,
    pub selected: bool,
}

/// Visuals for cluster mode
pub fn build_cluster_visuals(
    buckets: &[ClusterBucket],
    sprites: &SpriteResolver,
    selected: Option<&str>,
) -> Vec<MarkerVisual> {
    buckets
        .iter()
        .map(|bucket| {
            let count = bucket.display_count();
            let is_selected = selected.map_or(false, |id| id == bucket.id || bucket.contains(id));
            let mut z_index = Z_CLUSTER_BASE + count.min(Z_MAX_COUNT) as i32;
            if is_selected {
                z_index += Z_SELECTED;
            }
            MarkerVisual {
                id: bucket.id.clone(),
                coordinate: bucket.display,
                image: sprites.cluster_image(count),
                anchor: Anchor::CENTER,
                z_index,
                is_cluster: true,
                is_stacked: false,
                focus_coordinate: bucket.focus,
                count,
                labeled: false,
                selected: is_selected,
            }
        })
        .collect()
}

/// Visuals for single mode, one per location group
pub fn build_single_visuals(
    groups: &[LocationGroup],
    labels: &[LabelPlacement],
    sprites: &mut SpriteResolver,
    selected: Option<&str>,
) -> Vec<MarkerVisual> {
    let labeled: HashSet<&str> = labels.iter().map(|p| p.id.as_str()).collect();

    groups
        .iter()
        .map(|group| {
            let id = group.id();
            let is_stacked = group.is_stacked();
            let is_labeled = labeled.contains(id.as_str());
            let is_selected = selected.map_or(false, |s| s == id || group.contains(s));

            let rating = group.best_rating().unwrap_or(0.0).clamp(0.0, MAX_RATING);
            let mut z_index = (rating * Z_RATING_SCALE).round() as i32;
            if is_labeled {
                z_index += Z_LABELED_BONUS;
            }
            if is_selected {
                z_index += Z_SELECTED;
            }

            MarkerVisual {
                image: sprites.resolve_group(group),
                coordinate: group.coordinate,
                anchor: Anchor::PIN,
                z_index,
                is_cluster: false,
                is_stacked,
                focus_coordinate: group.coordinate,
                count: group.members.len() as u32,
                labeled: is_labeled,
                selected: is_selected,
                id,
            }
        })
        .collect()
}

/// Stable key of a physical render slot
pub fn slot_key(slot: usize) -> String {
    format!("slot-{slot:03}")
}

/// One physical annotation in the host view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderItem {
    /// Slot key; never changes for a given slot
    pub key: String,
    pub slot: usize,
    /// Logical marker in this slot, `None` for placeholders
    pub marker_id: Option<String>,
    pub coordinate: LatLng,
    pub image: ImageRef,
    pub anchor: Anchor,
    pub z_index: i32,
    pub opacity: f32,
    pub is_cluster: bool,
    pub is_stacked: bool,
    pub focus_coordinate: LatLng,
    pub count: u32,
    pub labeled: bool,
    pub selected: bool,
}

impl RenderItem {
    /// Inert item for an unused slot: off-screen, invisible, below everything
    pub fn placeholder(slot: usize) -> Self {
        let parked = LatLng::new(PLACEHOLDER_LAT, PLACEHOLDER_LNG);
        Self {
            key: slot_key(slot),
            slot,
            marker_id: None,
            coordinate: parked,
            image: ImageRef::Placeholder,
            anchor: Anchor::CENTER,
            z_index: PLACEHOLDER_Z_INDEX,
            opacity: 0.0,
            is_cluster: false,
            is_stacked: false,
            focus_coordinate: parked,
            count: 0,
            labeled: false,
            selected: false,
        }
    }

    pub fn from_visual(slot: usize, visual: &MarkerVisual) -> Self {
        Self {
            key: slot_key(slot),
            slot,
            marker_id: Some(visual.id.clone()),
            coordinate: visual.coordinate,
            image: visual.image.clone(),
            anchor: visual.anchor,
            z_index: visual.z_index,
            opacity: 1.0,
            is_cluster: visual.is_cluster,
            is_stacked: visual.is_stacked,
            focus_coordinate: visual.focus_coordinate,
            count: visual.count,
            labeled: visual.labeled,
            selected: visual.selected,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.marker_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::bounds::ScreenRect,
        data::{
            grouping::group_by_location,
            marker::{Category, MarkerPoint},
        },
        labels::selector::LabelSlot,
        spatial::clustering::{cluster, ClusterPoint, ClusteringConfig},
    };

    #[test]
    fn test_cluster_visuals() {
        let points: Vec<ClusterPoint> = (0..4)
            .map(|i| {
                ClusterPoint::new(vec![format!("p{i}")], LatLng::new(0.0, i as f64 * 0.0001), 1)
            })
            .collect();
        let buckets = cluster(&points, 10.0, &ClusteringConfig::default());
        let visuals = build_cluster_visuals(&buckets, &SpriteResolver::default(), Some("p2"));

        assert_eq!(visuals.len(), 1);
        let v = &visuals[0];
        assert!(v.is_cluster);
        assert_eq!(v.count, 4);
        assert_eq!(v.anchor, Anchor::CENTER);
        assert_eq!(v.image, ImageRef::Cluster { tier: 2 });
        assert!(v.selected);
        assert_eq!(v.z_index, Z_CLUSTER_BASE + 4 + Z_SELECTED);
    }

    #[test]
    fn test_single_visuals() {
        let markers = vec![
            MarkerPoint::new("a", LatLng::new(1.0, 1.0)).with_rating(4.0),
            MarkerPoint::new("b", LatLng::new(2.0, 2.0)),
            MarkerPoint::new("c", LatLng::new(2.0, 2.0)).with_category(Category::Bar),
        ];
        let groups = group_by_location(&markers);
        let labels = vec![LabelPlacement {
            id: "a".into(),
            slot: LabelSlot::Below,
            rect: ScreenRect::new(0.0, 0.0, 40.0, 18.0),
            score: 1.0,
        }];
        let mut sprites = SpriteResolver::default();
        let visuals = build_single_visuals(&groups, &labels, &mut sprites, None);

        assert_eq!(visuals.len(), 2);
        assert_eq!(visuals[0].id, "a");
        assert!(visuals[0].labeled);
        assert_eq!(visuals[0].z_index, 40 + Z_LABELED_BONUS);
        assert_eq!(visuals[0].anchor, Anchor::PIN);

        assert!(visuals[1].is_stacked);
        assert_eq!(visuals[1].image, ImageRef::Stacked);
        assert_eq!(visuals[1].count, 2);
    }

    #[test]
    fn test_placeholder_is_inert() {
        let item = RenderItem::placeholder(7);
        assert_eq!(item.key, "slot-007");
        assert!(item.is_placeholder());
        assert_eq!(item.opacity, 0.0);
        assert_eq!(item.z_index, PLACEHOLDER_Z_INDEX);
        assert_eq!(item.image, ImageRef::Placeholder);
    }
}
