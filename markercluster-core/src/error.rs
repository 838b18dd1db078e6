//! Error types for markercluster-core.

use thiserror::Error;

/// Result type alias for markercluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for marker clustering.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Coordinate outside the valid latitude/longitude range, or not finite.
    #[error("invalid coordinate: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Clustering radius that is not a positive finite number.
    #[error("invalid clustering radius: {0}")]
    InvalidRadius(f64),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Center read on a cluster with no members.
    #[error("cannot read the center of an empty cluster")]
    EmptyCluster,
}
