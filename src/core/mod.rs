pub mod bounds;
pub mod camera;
pub mod config;
pub mod constants;
pub mod geo;

pub use bounds::{Bounds, ScreenRect};
pub use camera::{Camera, Region, ScreenSize, Viewport};
pub use config::{PerformanceProfile, PipelineOptions};
pub use geo::{LatLng, LatLngBounds, Point};
