//! Prelude module for common poi-markers types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use poi_markers::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, ScreenRect},
    camera::{
        region_fitting, region_for_zoom, zoom_for_region, Camera, Region, ScreenSize, Viewport,
    },
    config::{ClusterPressConfig, PerformanceProfile, PipelineOptions},
    geo::{LatLng, LatLngBounds, Point},
};

pub use crate::data::{
    filter::{FilterState, FilterStore, SubscriptionId},
    grouping::{group_by_location, LocationGroup},
    marker::{sanitize, Category, MarkerPoint},
};

pub use crate::spatial::{
    clustering::{cluster, ClusterBucket, ClusterPoint, Clustering, ClusteringConfig},
    culling::{Culling, CullingConfig},
    index::{SpatialIndex, SpatialItem},
};

pub use crate::display::mode::{DisplayMode, DisplayModeConfig, DisplayModeController, ModeTrigger};

pub use crate::labels::{
    candidate::LabelCandidate,
    selector::{select_labels, LabelContext, LabelPlacement, LabelPolicy, LabelSelector, LabelSlot},
};

pub use crate::render::{
    builder::{Anchor, MarkerVisual, RenderItem},
    pool::{MarkerSlotPool, PoolConfig, PoolState},
    sprites::{ImageRef, SpriteConfig, SpriteResolver},
};

pub use crate::pipeline::{
    controller::{Frame, FrameStats, MarkerPipeline},
    projection::{ProjectionRequest, ProjectionResult},
    throttle::ThrottleConfig,
};

pub use crate::traits::{DetachedHost, HostMapView, ScreenProjector, SpriteFetcher};

pub use crate::{Error as MarkerError, Result};

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
