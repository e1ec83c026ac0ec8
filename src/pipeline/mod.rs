pub mod controller;
pub mod generation;
pub mod projection;
pub mod throttle;

pub use controller::{Frame, FrameStats, MarkerPipeline};
pub use generation::{GenerationCounter, VersionedState};
pub use projection::{
    query_native_projection, AsyncInbox, NativeProjectionCache, ProjectionRequest, ProjectionResult,
};
pub use throttle::{GestureThrottle, ThrottleConfig};
