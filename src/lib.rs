//! # poi-markers
//!
//! Turns an unbounded set of geo-tagged points of interest and a moving map
//! camera into a small, stable set of render items for a host map view.
//!
//! Each frame runs the same pipeline: group by location, then either cluster
//! and cull (cluster mode) or cull and place labels (single mode), then map
//! the result onto a fixed pool of render slots. [`MarkerPipeline`] drives it
//! from host events.

pub mod core;
pub mod data;
pub mod display;
pub mod labels;
pub mod pipeline;
pub mod prelude;
pub mod render;
pub mod runtime;
pub mod spatial;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::{Bounds, ScreenRect},
    camera::{Camera, Region, ScreenSize, Viewport},
    config::{PerformanceProfile, PipelineOptions},
    geo::{LatLng, LatLngBounds, Point},
};

pub use data::{
    filter::{FilterState, FilterStore},
    grouping::LocationGroup,
    marker::{Category, MarkerPoint},
};

pub use display::mode::{DisplayMode, DisplayModeController, ModeTrigger};

pub use labels::selector::{LabelPlacement, LabelSelector, LabelSlot};

pub use pipeline::controller::{Frame, FrameStats, MarkerPipeline};

pub use render::{
    builder::RenderItem,
    pool::MarkerSlotPool,
    sprites::{ImageRef, SpriteResolver},
};

pub use spatial::{
    clustering::{ClusterBucket, Clustering},
    culling::Culling,
    index::SpatialIndex,
};

pub use traits::{HostMapView, ScreenProjector, SpriteFetcher};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MarkerError>;

/// Errors at the crate's internal boundaries: host calls, sprite fetches and configuration.
///
/// Frame-level operations never return these; they degrade instead.
#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Host error: {0}")]
    Host(String),

    #[error("Host call timed out")]
    Timeout,

    #[error("Sprite {key} unavailable: {reason}")]
    Sprite { key: String, reason: String },

    #[error("Stale result for generation {issued}, latest is {latest}")]
    StaleGeneration { issued: u64, latest: u64 },

    #[error("Config error: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = MarkerError;

/// Installs `env_logger` as the `log` backend. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("poi_markers=info");
    let _ = env_logger::Builder::from_env(env)
        .is_test(cfg!(test))
        .try_init();
}
