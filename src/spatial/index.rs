use crate::core::geo::Point;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A projected point stored in the R-tree.
///
/// `slot` is the position of the source item in the caller's slice, so query
/// results can be mapped back without cloning payloads into the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialItem {
    pub slot: usize,
    pub position: Point,
    pub weight: u32,
}

impl SpatialItem {
    pub fn new(slot: usize, position: Point, weight: u32) -> Self {
        Self {
            slot,
            position,
            weight,
        }
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl RTreeObject for SpatialItem {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.x, self.position.y])
    }
}

impl PointDistance for SpatialItem {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position.x - point[0];
        let dy = self.position.y - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree over projected world-pixel positions
pub struct SpatialIndex {
    rtree: RTree<SpatialItem>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            rtree: RTree::new(),
        }
    }

    /// Builds the tree in one pass. Non-finite positions are skipped.
    pub fn bulk_load(items: Vec<SpatialItem>) -> Self {
        let items: Vec<_> = items
            .into_iter()
            .filter(|item| item.position.is_finite())
            .collect();
        Self {
            rtree: RTree::bulk_load(items),
        }
    }

    /// Items within `radius` of `center`, sorted by slot so callers iterate deterministically
    pub fn query_radius(&self, center: &Point, radius: f64) -> Vec<&SpatialItem> {
        let mut found: Vec<_> = self
            .rtree
            .locate_within_distance([center.x, center.y], radius * radius)
            .collect();
        found.sort_by_key(|item| item.slot);
        found
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
