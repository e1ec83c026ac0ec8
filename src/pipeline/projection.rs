//! Advisory native screen projections, tagged with generations.
//!
//! The host may know the exact screen point of a coordinate better than the
//! mercator math does. Those answers arrive asynchronously and late; a result
//! is only used if it belongs to the latest issued generation.

use crate::{
    core::{
        camera::Viewport,
        geo::{LatLng, Point},
    },
    prelude::HashMap,
    runtime,
    traits::{HostMapView, ScreenProjector},
    MarkerError, Result,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRequest {
    pub generation: u64,
    pub targets: Vec<(String, LatLng)>,
}

/// Points the host answered for; failed or timed out targets are absent
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionResult {
    pub generation: u64,
    pub points: Vec<(String, Point)>,
}

/// Asks the host for every target concurrently, under one deadline
pub async fn query_native_projection(
    host: &dyn HostMapView,
    request: ProjectionRequest,
    timeout: Duration,
) -> ProjectionResult {
    let calls: Vec<_> = request
        .targets
        .iter()
        .map(|(_, coordinate)| host.point_for_coordinate(*coordinate))
        .collect();
    let results = runtime::join_with_timeout(calls, timeout).await;

    let mut failed = 0usize;
    let points = request
        .targets
        .into_iter()
        .zip(results)
        .filter_map(|((id, _), result)| match result {
            Ok(point) if point.is_finite() => Some((id, point)),
            _ => {
                failed += 1;
                None
            }
        })
        .collect();

    if failed > 0 {
        log::trace!("{} native projections failed for generation {}", failed, request.generation);
    }
    ProjectionResult {
        generation: request.generation,
        points,
    }
}

/// Native points of the latest applied generation
#[derive(Debug, Clone, Default)]
pub struct NativeProjectionCache {
    issued: u64,
    applied: Option<u64>,
    points: HashMap<String, Point>,
}

impl NativeProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `generation` as the latest issued one and builds its request
    pub fn issue(&mut self, generation: u64, targets: Vec<(String, LatLng)>) -> ProjectionRequest {
        self.issued = self.issued.max(generation);
        ProjectionRequest { generation, targets }
    }

    /// Stores a result if it answers the latest issued request
    pub fn apply(&mut self, result: ProjectionResult) -> Result<usize> {
        if result.generation != self.issued {
            return Err(MarkerError::StaleGeneration {
                issued: result.generation,
                latest: self.issued,
            });
        }
        self.points = result.points.into_iter().collect();
        self.applied = Some(result.generation);
        Ok(self.points.len())
    }

    /// Native points if they were measured for `generation`
    pub fn points_for(&self, generation: u64) -> Option<&HashMap<String, Point>> {
        (self.applied == Some(generation)).then_some(&self.points)
    }
}

/// Native points where available, mercator everywhere else
pub struct CachedProjector<'a> {
    native: Option<&'a HashMap<String, Point>>,
    fallback: &'a Viewport,
}

impl<'a> CachedProjector<'a> {
    pub fn new(native: Option<&'a HashMap<String, Point>>, fallback: &'a Viewport) -> Self {
        Self { native, fallback }
    }
}

impl ScreenProjector for CachedProjector<'_> {
    fn project(&self, id: &str, coordinate: &LatLng) -> Option<Point> {
        if let Some(point) = self.native.and_then(|points| points.get(id)) {
            return Some(*point);
        }
        ScreenProjector::project(self.fallback, id, coordinate)
    }
}

/// Channel that carries async results back into the synchronous pipeline
#[derive(Debug, Clone)]
pub struct AsyncInbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> AsyncInbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Handle for async tasks to post results with
    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    /// Takes everything received so far without blocking
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(item) => out.push(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for AsyncInbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
