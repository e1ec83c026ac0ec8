use crate::core::constants::{MAX_LATITUDE, TILE_SIZE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Builds a coordinate from the host's `[lng, lat]` ordering
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the range the mercator projection can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Rounds both components to `decimals` places. Used as a grouping key.
    pub fn rounded_key(&self, decimals: u32) -> (i64, i64) {
        let factor = 10_f64.powi(decimals as i32);
        (
            (self.lat * factor).round() as i64,
            (self.lng * factor).round() as i64,
        )
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        self.distance_squared_to(other).sqrt()
    }

    pub fn distance_squared_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Smallest bounds containing every point, `None` for an empty iterator
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(*first, *first);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Gets the span of the bounds
    pub fn span(&self) -> LatLng {
        LatLng::new(
            self.north_east.lat - self.south_west.lat,
            self.north_east.lng - self.south_west.lng,
        )
    }
}

/// Size of the mercator world in pixels at a (possibly fractional) zoom
pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2_f64.powf(zoom)
}

/// Projects a coordinate to spherical-mercator world pixels at the given zoom.
///
/// The origin is the north-west corner of the world; y grows southward.
pub fn project(lat_lng: &LatLng, zoom: f64) -> Point {
    let size = world_size(zoom);
    let x = (lat_lng.lng + 180.0) / 360.0 * size;
    let sin = LatLng::clamp_lat(lat_lng.lat).to_radians().sin();
    let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * size;
    Point::new(x, y)
}

/// Inverse of [`project`]
pub fn unproject(point: &Point, zoom: f64) -> LatLng {
    let size = world_size(zoom);
    let lng = point.x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * point.y / size;
    let lat = n.sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

/// Weighted centroid of `(coordinate, weight)` pairs.
///
/// Non-positive weights count as 1 so a degenerate member still pulls the centroid.
pub fn weighted_centroid<'a>(items: impl IntoIterator<Item = (&'a LatLng, f64)>) -> Option<LatLng> {
    let mut lat = 0.0;
    let mut lng = 0.0;
    let mut total = 0.0;
    for (coordinate, weight) in items {
        let w = if weight > 0.0 { weight } else { 1.0 };
        lat += coordinate.lat * w;
        lng += coordinate.lng * w;
        total += w;
    }
    if total > 0.0 {
        Some(LatLng::new(lat / total, lng / total))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(40.7128, -74.0060);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_lng_lat_pair_order() {
        let coord = LatLng::from_lng_lat([13.4, 52.5]);
        assert_eq!(coord.lat, 52.5);
        assert_eq!(coord.lng, 13.4);
    }

    #[test]
    fn test_projection_origin_and_inverse() {
        let origin = project(&LatLng::new(0.0, 0.0), 0.0);
        assert!((origin.x - 128.0).abs() < 1e-9);
        assert!((origin.y - 128.0).abs() < 1e-9);

        let coord = LatLng::new(48.8566, 2.3522);
        let back = unproject(&project(&coord, 12.0), 12.0);
        assert!((back.lat - coord.lat).abs() < 1e-9);
        assert!((back.lng - coord.lng).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_centroid() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(4.0, 4.0);
        let c = weighted_centroid([(&a, 3.0), (&b, 1.0)]).unwrap();
        assert!((c.lat - 1.0).abs() < 1e-12);
        assert!((c.lng - 1.0).abs() < 1e-12);
        assert!(weighted_centroid(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = LatLngBounds::from_coords(40.0, -75.0, 41.0, -73.0);
        assert!(bounds.contains(&LatLng::new(40.5, -74.0)));
        assert!(!bounds.contains(&LatLng::new(42.0, -74.0)));
    }

    #[test]
    fn test_bounds_from_points() {
        let pts = [LatLng::new(1.0, 2.0), LatLng::new(-1.0, 5.0)];
        let b = LatLngBounds::from_points(pts.iter()).unwrap();
        assert_eq!(b.south_west, LatLng::new(-1.0, 2.0));
        assert_eq!(b.north_east, LatLng::new(1.0, 5.0));
    }
}
