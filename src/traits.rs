//! Seams between the marker pipeline and the host it runs in.
//!
//! The host owns the native map view and the image loader. Both are optional
//! capabilities: every method has a default that reports it as unavailable, so
//! the pipeline keeps working on its mercator fallback alone.

use crate::{
    core::{
        camera::{Camera, Viewport},
        geo::{LatLng, Point},
    },
    MarkerError, Result,
};
use async_trait::async_trait;
use std::time::Duration;

/// The native map view hosting the markers
#[async_trait]
pub trait HostMapView: Send + Sync {
    /// Screen point the native view uses for `coordinate`
    async fn point_for_coordinate(&self, _coordinate: LatLng) -> Result<Point> {
        Err(MarkerError::Host("point_for_coordinate is not supported".to_string()))
    }

    /// Camera as the native view currently reports it
    async fn get_camera(&self) -> Result<Camera> {
        Err(MarkerError::Host("get_camera is not supported".to_string()))
    }

    /// Moves the camera, e.g. after a cluster press. Hosts without animation may ignore it.
    async fn animate_camera(&self, _target: Camera, _duration: Duration) -> Result<()> {
        Ok(())
    }
}

/// Host without any native capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

#[async_trait]
impl HostMapView for DetachedHost {}

/// Downloads and decodes remote sprite images ahead of use
#[async_trait]
pub trait SpriteFetcher: Send + Sync {
    async fn prefetch(&self, key: &str, url: &str) -> Result<()>;
}

/// Maps a marker to screen pixels, synchronously
pub trait ScreenProjector {
    /// `None` if the marker cannot be placed on screen this frame
    fn project(&self, id: &str, coordinate: &LatLng) -> Option<Point>;
}

impl ScreenProjector for Viewport {
    fn project(&self, _id: &str, coordinate: &LatLng) -> Option<Point> {
        if !coordinate.is_finite() {
            return None;
        }
        let point = self.lat_lng_to_pixel(coordinate);
        point.is_finite().then_some(point)
    }
}
