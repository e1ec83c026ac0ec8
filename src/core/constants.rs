//! Core constants for the marker pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default square tile size in pixels. The mercator world is `TILE_SIZE * 2^zoom` wide.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the spherical mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Zoom range accepted from the host.
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 21.0;

/// Decimal places used when grouping markers that share a coordinate.
pub const GROUPING_PRECISION: u32 = 5;

/// Where unassigned pool slots are parked. Far south-west, outside any realistic camera.
pub const PLACEHOLDER_LAT: f64 = -84.9;
pub const PLACEHOLDER_LNG: f64 = -179.9;

/// Z-index for placeholder slots, below everything the builder emits.
pub const PLACEHOLDER_Z_INDEX: i32 = -10_000;

/// Maximum rating value accepted on a marker.
pub const MAX_RATING: f64 = 5.0;

/// Pin anchor (bottom-center) and cluster anchor (center) in normalized icon space.
pub const PIN_ANCHOR: (f64, f64) = (0.5, 1.0);
pub const CLUSTER_ANCHOR: (f64, f64) = (0.5, 0.5);
