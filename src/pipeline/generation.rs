//! Generation-tagged "latest value" state.
//!
//! Every input event bumps the generation. Async work captures the generation
//! it was issued for and is only applied while that generation is still current.

use crate::{
    core::camera::{Camera, ScreenSize},
    data::marker::MarkerPoint,
    prelude::Arc,
};

/// Monotonic counter of issued generations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next generation
    pub fn next(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current
    }
}

/// Latest inputs of the pipeline, read fresh at every recompute
#[derive(Debug, Clone)]
pub struct VersionedState {
    counter: GenerationCounter,
    camera: Option<Camera>,
    size: ScreenSize,
    markers: Arc<Vec<MarkerPoint>>,
}

impl VersionedState {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            counter: GenerationCounter::new(),
            camera: None,
            size,
            markers: Arc::new(Vec::new()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.counter.current()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.counter.is_current(generation)
    }

    pub fn camera(&self) -> Option<Camera> {
        self.camera
    }

    pub fn size(&self) -> ScreenSize {
        self.size
    }

    pub fn markers(&self) -> &Arc<Vec<MarkerPoint>> {
        &self.markers
    }

    /// Stores a camera. Invalid cameras are ignored and return `None`.
    pub fn set_camera(&mut self, camera: Camera) -> Option<u64> {
        if !camera.is_valid() {
            log::debug!("ignoring invalid camera {:?}", camera);
            return None;
        }
        self.camera = Some(camera.clamped());
        Some(self.counter.next())
    }

    pub fn set_size(&mut self, size: ScreenSize) -> u64 {
        self.size = size;
        self.counter.next()
    }

    pub fn set_markers(&mut self, markers: Vec<MarkerPoint>) -> u64 {
        self.markers = Arc::new(markers);
        self.counter.next()
    }

    /// Marks a change that has no stored value, e.g. new filters
    pub fn touch(&mut self) -> u64 {
        self.counter.next()
    }
}

impl Default for VersionedState {
    fn default() -> Self {
        Self::new(ScreenSize::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;

    #[test]
    fn test_generations_are_monotonic() {
        let mut counter = GenerationCounter::new();
        let a = counter.next();
        let b = counter.next();
        assert!(b > a);
        assert!(counter.is_current(b));
        assert!(!counter.is_current(a));
    }

    #[test]
    fn test_every_change_bumps_generation() {
        let mut state = VersionedState::default();
        let g1 = state.set_camera(Camera::new(LatLng::new(1.0, 1.0), 10.0)).unwrap();
        let g2 = state.set_markers(vec![MarkerPoint::new("a", LatLng::new(1.0, 1.0))]);
        let g3 = state.set_size(ScreenSize::new(100.0, 100.0));
        assert!(g1 < g2 && g2 < g3);
        assert_eq!(state.markers().len(), 1);
        assert!(state.is_current(g3));
    }

    #[test]
    fn test_invalid_camera_ignored() {
        let mut state = VersionedState::default();
        assert!(state.set_camera(Camera::new(LatLng::new(f64::NAN, 0.0), 10.0)).is_none());
        assert!(state.camera().is_none());
        assert_eq!(state.generation(), 0);
    }
}
