//! markercluster-core: Core types for map marker clustering.
//!
//! This crate provides geographic coordinates, marker identities and
//! events, the incrementally maintained [`MarkerCluster`], and the
//! configuration and error types shared by the rest of the workspace.
//!

pub mod cluster;
pub mod clustering;
pub mod coord;
pub mod error;
pub mod marker;
pub mod notify;

pub use cluster::{MarkerCluster, Markers, RECENTER_INTERVAL};
pub use clustering::{
    pixels_to_degrees, ClusterId, ClusterSummary, ClusteringConfig, ClusteringStatistics,
};
pub use coord::GeoCoord;
pub use error::{Error, Result};
pub use marker::{EventKind, Marker, MarkerEvent, MarkerId};
pub use notify::{LogNotifier, MemoryNotifier, Notifier};
