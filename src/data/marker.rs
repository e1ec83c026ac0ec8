use crate::{
    core::{constants::MAX_RATING, geo::LatLng},
    MarkerError, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business category of a point of interest.
///
/// `Multi` is synthetic: the data layer uses it for records that already
/// represent several venues at one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Restaurant,
    Cafe,
    Bar,
    Hotel,
    Attraction,
    Shop,
    Service,
    Other,
    Multi,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Restaurant,
        Category::Cafe,
        Category::Bar,
        Category::Hotel,
        Category::Attraction,
        Category::Shop,
        Category::Service,
        Category::Other,
        Category::Multi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Restaurant => "restaurant",
            Category::Cafe => "cafe",
            Category::Bar => "bar",
            Category::Hotel => "hotel",
            Category::Attraction => "attraction",
            Category::Shop => "shop",
            Category::Service => "service",
            Category::Other => "other",
            Category::Multi => "multi",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_weight() -> u32 {
    1
}

/// A geo-tagged point of interest as delivered by the data layer.
///
/// Immutable for the duration of a frame. `id` is stable across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPoint {
    pub id: String,
    pub coordinate: LatLng,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub sprite_key: Option<String>,
    /// Authoring signal that pushes a marker up the label ranking
    #[serde(default)]
    pub label_priority: f64,
}

impl MarkerPoint {
    pub fn new(id: impl Into<String>, coordinate: LatLng) -> Self {
        Self {
            id: id.into(),
            coordinate,
            category: Category::default(),
            weight: 1,
            rating: None,
            title: String::new(),
            group_id: None,
            sprite_key: None,
            label_priority: 0.0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_sprite_key(mut self, key: impl Into<String>) -> Self {
        self.sprite_key = Some(key.into());
        self
    }

    pub fn with_label_priority(mut self, priority: f64) -> Self {
        self.label_priority = priority;
        self
    }

    /// Weight floored at 1
    pub fn effective_weight(&self) -> u32 {
        self.weight.max(1)
    }

    /// Rating clamped to `0..=5`, `None` when absent or not a number
    pub fn normalized_rating(&self) -> Option<f64> {
        self.rating
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, MAX_RATING))
    }

    /// Points with a non-finite coordinate or a blank id never enter the pipeline
    pub fn is_renderable(&self) -> bool {
        self.coordinate.is_finite() && !self.id.trim().is_empty()
    }

    /// Coordinate check with the offending values
    pub fn validate(&self) -> Result<()> {
        if !self.coordinate.is_finite() {
            return Err(MarkerError::InvalidCoordinates(format!(
                "{}: ({}, {})",
                self.id, self.coordinate.lat, self.coordinate.lng
            )));
        }
        Ok(())
    }

    /// Title usable for an inline label
    pub fn label_title(&self) -> Option<&str> {
        let title = self.title.trim();
        (!title.is_empty()).then_some(title)
    }
}

/// Drops malformed points and duplicate ids, keeping the first occurrence.
pub fn sanitize(points: &[MarkerPoint]) -> Vec<MarkerPoint> {
    let mut seen = crate::prelude::HashSet::default();
    let mut out = Vec::with_capacity(points.len());
    let mut dropped = 0usize;

    for point in points {
        if let Err(err) = point.validate() {
            log::trace!("dropping marker: {}", err);
            dropped += 1;
            continue;
        }
        if point.id.trim().is_empty() || !seen.insert(point.id.as_str()) {
            dropped += 1;
            continue;
        }
        out.push(point.clone());
    }

    if dropped > 0 {
        log::debug!("dropped {} malformed or duplicate markers", dropped);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let json = r#"{"id":"a","coordinate":{"lat":1.0,"lng":2.0}}"#;
        let point: MarkerPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.weight, 1);
        assert_eq!(point.category, Category::Other);
        assert!(point.rating.is_none());
    }

    #[test]
    fn test_normalized_rating() {
        let p = MarkerPoint::new("a", LatLng::new(0.0, 0.0));
        assert_eq!(p.clone().with_rating(7.0).normalized_rating(), Some(5.0));
        assert_eq!(p.clone().with_rating(f64::NAN).normalized_rating(), None);
        assert_eq!(p.with_rating(3.5).normalized_rating(), Some(3.5));
    }

    #[test]
    fn test_sanitize_drops_bad_points() {
        let points = vec![
            MarkerPoint::new("a", LatLng::new(1.0, 1.0)),
            MarkerPoint::new("b", LatLng::new(f64::NAN, 1.0)),
            MarkerPoint::new("a", LatLng::new(2.0, 2.0)),
            MarkerPoint::new(" ", LatLng::new(2.0, 2.0)),
            MarkerPoint::new("c", LatLng::new(1.0, f64::INFINITY)),
        ];
        let clean = sanitize(&points);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].coordinate, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn test_label_title_trims() {
        let p = MarkerPoint::new("a", LatLng::new(0.0, 0.0)).with_title("  ");
        assert!(p.label_title().is_none());
        let p = p.with_title(" Cafe Luna ");
        assert_eq!(p.label_title(), Some("Cafe Luna"));
    }
}
