use crate::core::{
    bounds::Bounds,
    constants::{MAX_ZOOM, MIN_ZOOM, TILE_SIZE},
    geo::{self, LatLng, LatLngBounds, Point},
};
use serde::{Deserialize, Serialize};

/// Camera as reported by the host: center and (fractional) zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub center: LatLng,
    pub zoom: f64,
}

impl Camera {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self { center, zoom }
    }

    /// Builds a camera from the host's `{center: [lng, lat], zoom}` shape
    pub fn from_lng_lat(center: [f64; 2], zoom: f64) -> Self {
        Self::new(LatLng::from_lng_lat(center), zoom)
    }

    /// Usable for projection math: finite center and zoom
    pub fn is_valid(&self) -> bool {
        self.center.is_finite() && self.zoom.is_finite()
    }

    /// Returns a copy with zoom clamped to the supported range
    pub fn clamped(&self) -> Self {
        Self::new(
            LatLng::new(LatLng::clamp_lat(self.center.lat), self.center.lng),
            self.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        )
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(LatLng::default(), 2.0)
    }
}

/// Size of the host map view in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width, self.height)
    }

    /// Half of the screen diagonal, the largest distance from center to any on-screen point
    pub fn half_diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt() / 2.0
    }
}

impl Default for ScreenSize {
    /// Typical phone portrait viewport in points
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

/// A camera paired with the view size it is rendered into.
///
/// All screen-space math that does not go through a native host projection
/// goes through here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub camera: Camera,
    pub size: ScreenSize,
}

impl Viewport {
    pub fn new(camera: Camera, size: ScreenSize) -> Self {
        Self { camera, size }
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom
    }

    /// Projects a LatLng to world pixel coordinates at the camera zoom
    pub fn project(&self, lat_lng: &LatLng) -> Point {
        geo::project(lat_lng, self.camera.zoom)
    }

    /// Converts a geographical coordinate to screen pixel coordinates (container relative)
    pub fn lat_lng_to_pixel(&self, lat_lng: &LatLng) -> Point {
        let origin = self.project(&self.camera.center);
        let mut point = self.project(lat_lng).subtract(&origin);

        // Pick the closest world copy so markers near the antimeridian stay on screen
        let world = geo::world_size(self.camera.zoom);
        if point.x > world / 2.0 {
            point.x -= world;
        } else if point.x < -world / 2.0 {
            point.x += world;
        }

        point.add(&self.size.center())
    }

    /// Converts screen pixel coordinates back to geographical coordinates
    pub fn pixel_to_lat_lng(&self, pixel: &Point) -> LatLng {
        let origin = self.project(&self.camera.center);
        let world = pixel.subtract(&self.size.center()).add(&origin);
        let lat_lng = geo::unproject(&world, self.camera.zoom);
        LatLng::new(lat_lng.lat, LatLng::wrap_lng(lat_lng.lng))
    }

    /// Visible latitude and longitude half-spans, returned as `LatLng { lat, lng }`
    pub fn half_spans(&self) -> LatLng {
        let region = region_for_zoom(self.camera.center, self.camera.zoom, self.size);
        LatLng::new(region.lat_delta / 2.0, region.lng_delta / 2.0)
    }

    /// Geographic bounds of the view grown by `padding_ratio` of each half-span on every side
    pub fn padded_bounds(&self, padding_ratio: f64) -> LatLngBounds {
        let half = self.half_spans();
        let factor = 1.0 + padding_ratio.max(0.0);
        let lat = half.lat * factor;
        let lng = half.lng * factor;
        let center = self.camera.center;
        LatLngBounds::from_coords(
            center.lat - lat,
            center.lng - lng,
            center.lat + lat,
            center.lng + lng,
        )
    }
}

/// Host-style region: a center plus full latitude/longitude spans
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: LatLng,
    pub lat_delta: f64,
    pub lng_delta: f64,
}

impl Region {
    pub fn new(center: LatLng, lat_delta: f64, lng_delta: f64) -> Self {
        Self {
            center,
            lat_delta,
            lng_delta,
        }
    }

    pub fn bounds(&self) -> LatLngBounds {
        LatLngBounds::from_coords(
            self.center.lat - self.lat_delta / 2.0,
            self.center.lng - self.lng_delta / 2.0,
            self.center.lat + self.lat_delta / 2.0,
            self.center.lng + self.lng_delta / 2.0,
        )
    }
}

/// Zoom at which a region's longitude span fills the screen width.
///
/// Degenerate spans map to the maximum zoom.
pub fn zoom_for_region(region: &Region, size: ScreenSize) -> f64 {
    let lng_delta = region.lng_delta.abs();
    let lat_delta = region.lat_delta.abs();
    if size.is_empty() {
        return MIN_ZOOM;
    }

    let by_lng = if lng_delta > 0.0 {
        (360.0 * size.width / (lng_delta * TILE_SIZE)).log2()
    } else {
        MAX_ZOOM
    };

    // Latitude is stretched by mercator, so measure the span in projected units
    let by_lat = if lat_delta > 0.0 {
        let north = LatLng::new(region.center.lat + lat_delta / 2.0, region.center.lng);
        let south = LatLng::new(region.center.lat - lat_delta / 2.0, region.center.lng);
        let projected = (geo::project(&south, 0.0).y - geo::project(&north, 0.0).y).abs();
        if projected > 0.0 {
            (size.height / projected).log2()
        } else {
            MAX_ZOOM
        }
    } else {
        MAX_ZOOM
    };

    by_lng.min(by_lat).clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Region visible at `zoom` around `center` for a view of the given size
pub fn region_for_zoom(center: LatLng, zoom: f64, size: ScreenSize) -> Region {
    let world = geo::world_size(zoom);
    let lng_delta = (size.width / world * 360.0).min(360.0);

    let center_px = geo::project(&center, zoom);
    let north = geo::unproject(&Point::new(center_px.x, center_px.y - size.height / 2.0), zoom);
    let south = geo::unproject(&Point::new(center_px.x, center_px.y + size.height / 2.0), zoom);
    let lat_delta = (north.lat - south.lat).abs();

    Region::new(center, lat_delta, lng_delta)
}

/// Region that fits all `points`, each span grown by `padding_ratio` and never below `min_delta`.
pub fn region_fitting(points: &[LatLng], padding_ratio: f64, min_delta: f64) -> Option<Region> {
    let bounds = LatLngBounds::from_points(points.iter().filter(|p| p.is_finite()))?;
    let span = bounds.span();
    let factor = 1.0 + padding_ratio.max(0.0);
    Some(Region::new(
        bounds.center(),
        (span.lat * factor).max(min_delta),
        (span.lng * factor).max(min_delta),
    ))
}
