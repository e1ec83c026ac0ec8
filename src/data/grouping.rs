//! Group-by-location: markers that share a `group_id` or the same rounded
//! coordinate collapse into one [`LocationGroup`].

use crate::{
    core::{constants::GROUPING_PRECISION, geo::LatLng},
    data::marker::{Category, MarkerPoint},
    prelude::HashMap,
};

/// Markers rendered at one location.
///
/// Never empty. `coordinate` is the first member's coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationGroup {
    pub key: String,
    pub coordinate: LatLng,
    pub members: Vec<MarkerPoint>,
}

impl LocationGroup {
    fn new(key: String, first: MarkerPoint) -> Self {
        Self {
            key,
            coordinate: first.coordinate,
            members: vec![first],
        }
    }

    /// Logical render id: the marker id for single groups, a group id otherwise
    pub fn id(&self) -> String {
        if self.is_stacked() {
            format!("group:{}", self.key)
        } else {
            self.members[0].id.clone()
        }
    }

    /// More than one venue at this location
    pub fn is_stacked(&self) -> bool {
        self.members.len() > 1 || self.members[0].category == Category::Multi
    }

    pub fn first(&self) -> &MarkerPoint {
        &self.members[0]
    }

    /// Only set when the group has exactly one member
    pub fn single(&self) -> Option<&MarkerPoint> {
        match self.members.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn weight(&self) -> u32 {
        self.members
            .iter()
            .map(MarkerPoint::effective_weight)
            .fold(0, u32::saturating_add)
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Best rating among members, used for z-ordering stacked pins
    pub fn best_rating(&self) -> Option<f64> {
        self.members
            .iter()
            .filter_map(MarkerPoint::normalized_rating)
            .fold(None, |best, r| Some(best.map_or(r, |b: f64| b.max(r))))
    }
}

fn group_key(point: &MarkerPoint) -> String {
    match &point.group_id {
        Some(group) if !group.trim().is_empty() => format!("g:{}", group.trim()),
        _ => {
            let (lat, lng) = point.coordinate.rounded_key(GROUPING_PRECISION);
            format!("c:{}:{}", lat, lng)
        }
    }
}

/// Groups markers by location, preserving first-appearance order.
///
/// Malformed points are skipped.
pub fn group_by_location(points: &[MarkerPoint]) -> Vec<LocationGroup> {
    let mut index: HashMap<String, usize> = HashMap::default();
    let mut groups: Vec<LocationGroup> = Vec::new();

    for point in points.iter().filter(|p| p.is_renderable()) {
        let key = group_key(point);
        match index.get(&key) {
            Some(&i) => groups[i].members.push(point.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(LocationGroup::new(key, point.clone()));
            }
        }
    }

    groups
}
