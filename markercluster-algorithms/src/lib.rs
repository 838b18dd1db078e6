//! markercluster-algorithms: Marker clustering for interactive maps.
//!
//! This crate provides:
//! - **`ClusterIndex`** - incremental join rule with grid-backed lookup
//! - **partition** - deterministic from-scratch clustering
//! - **`SpatialGrid`** - cell bucketing of cluster centers
//! - **`MarkerFeed`** - hands background-loaded batches to the index owner
//!
#![warn(missing_docs)]

mod feed;
mod index;
pub mod partition;
pub mod spatial;

pub use feed::{
    CancelToken, FeedMessage, FeedReport, FeedSender, FeedStatus, MarkerFeed,
    DEFAULT_FEED_CAPACITY,
};
pub use index::ClusterIndex;
pub use partition::{canonical_order, partition};
pub use spatial::SpatialGrid;

// Re-export core clustering types
pub use markercluster_core::clustering::{
    ClusterId, ClusterSummary, ClusteringConfig, ClusteringStatistics,
};
