use crate::{
    core::{
        camera::Viewport,
        geo::{LatLng, LatLngBounds},
    },
    data::grouping::LocationGroup,
    spatial::clustering::ClusterBucket,
};
use serde::{Deserialize, Serialize};

/// Anything with a single geographic anchor that can be culled
pub trait Positioned {
    fn position(&self) -> LatLng;
}

impl Positioned for ClusterBucket {
    fn position(&self) -> LatLng {
        self.focus
    }
}

impl Positioned for LocationGroup {
    fn position(&self) -> LatLng {
        self.coordinate
    }
}

impl Positioned for LatLng {
    fn position(&self) -> LatLng {
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Extra margin on each side, as a fraction of the visible half-span
    pub padding_ratio: f64,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self { padding_ratio: 0.5 }
    }
}

/// Padded bounding-box culling against the camera.
pub struct Culling;

impl Culling {
    /// Returns `true` if `position` lies inside the viewport grown by `padding_ratio`.
    ///
    /// Longitude is compared as a wrapped delta so views across the antimeridian work.
    pub fn point_visible(viewport: &Viewport, position: &LatLng, padding_ratio: f64) -> bool {
        if !position.is_finite() {
            return false;
        }
        let half = viewport.half_spans();
        let factor = 1.0 + padding_ratio.max(0.0);
        let center = viewport.camera.center;

        let d_lat = (position.lat - center.lat).abs();
        let d_lng = LatLng::wrap_lng(position.lng - center.lng).abs();
        d_lat <= half.lat * factor && d_lng <= half.lng * factor
    }

    /// Keeps items whose position falls inside the padded view.
    ///
    /// If that leaves nothing although the input was non-empty, the input is
    /// returned unchanged: a stale camera must never blank the map.
    pub fn cull<T: Positioned + Clone>(
        items: &[T],
        viewport: &Viewport,
        padding_ratio: f64,
    ) -> Vec<T> {
        if items.is_empty() {
            return Vec::new();
        }
        if !viewport.camera.is_valid() || viewport.size.is_empty() {
            log::debug!("cull skipped: camera or layout not usable yet");
            return items.to_vec();
        }

        let visible: Vec<T> = items
            .iter()
            .filter(|item| Self::point_visible(viewport, &item.position(), padding_ratio))
            .cloned()
            .collect();

        if visible.is_empty() {
            log::debug!(
                "cull removed all {} items, falling back to the unculled set",
                items.len()
            );
            return items.to_vec();
        }

        log::trace!("cull kept {}/{} items", visible.len(), items.len());
        visible
    }

    /// The padded box used for culling, for hosts that want to query their own data
    pub fn padded_bounds(viewport: &Viewport, padding_ratio: f64) -> LatLngBounds {
        viewport.padded_bounds(padding_ratio)
    }
}
