pub mod clustering;
pub mod culling;
pub mod index;

pub use clustering::{cluster, ClusterBucket, ClusterPoint, Clustering, ClusteringConfig};
pub use culling::{Culling, CullingConfig, Positioned};
pub use index::{SpatialIndex, SpatialItem};
