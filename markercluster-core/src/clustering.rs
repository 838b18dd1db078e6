//! Clustering configuration, identifiers and statistics.
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use crate::{Error, GeoCoord, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width of a Web Mercator tile in pixels.
pub const TILE_SIZE_PX: f64 = 256.0;

/// Identifier of a cluster inside its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// What the renderer needs to draw one cluster glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterSummary {
    /// Cluster identifier.
    pub id: ClusterId,
    /// Cluster centroid.
    pub center: GeoCoord,
    /// Number of member markers.
    pub count: usize,
}

/// Converts a screen-space radius at a Web Mercator zoom level to degrees
/// of longitude.
///
/// One tile spans 360° at zoom 0 and halves with every zoom level.
#[must_use]
pub fn pixels_to_degrees(pixel_radius: f64, zoom: f64) -> f64 {
    pixel_radius * 360.0 / (TILE_SIZE_PX * zoom.exp2())
}

/// Configuration for marker clustering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringConfig {
    /// Maximum distance (in degrees) from a marker to a cluster center for
    /// the marker to join that cluster.
    pub radius: f64,
    /// Spatial grid cell size as a multiple of the radius.
    pub cell_scale: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius: 0.5,
            cell_scale: 1.0,
        }
    }
}

impl ClusteringConfig {
    /// Creates a new clustering configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration whose radius covers `pixel_radius` screen
    /// pixels at the given zoom level.
    #[must_use]
    pub fn for_zoom(zoom: f64, pixel_radius: f64) -> Self {
        Self::default().with_radius(pixels_to_degrees(pixel_radius, zoom))
    }

    /// Sets the clustering radius.
    #[must_use]
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Sets the grid cell scale.
    #[must_use]
    pub fn with_cell_scale(mut self, scale: f64) -> Self {
        self.cell_scale = scale;
        self
    }

    /// Grid cell size in degrees.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.radius * self.cell_scale
    }

    /// Checks that the radius and cell scale are usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRadius`] for a non-positive or non-finite
    /// radius and [`Error::ConfigError`] for a cell scale below 1.
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(Error::InvalidRadius(self.radius));
        }
        if !self.cell_scale.is_finite() || self.cell_scale < 1.0 {
            return Err(Error::ConfigError(format!(
                "cell scale must be a finite value >= 1, got {}",
                self.cell_scale
            )));
        }
        Ok(())
    }
}

/// Counters kept by a cluster index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringStatistics {
    /// Markers accepted into the index.
    pub markers_added: usize,
    /// Markers removed from the index.
    pub markers_removed: usize,
    /// Markers rejected for invalid coordinates.
    pub markers_rejected: usize,
    /// Markers that joined an existing cluster.
    pub joins: usize,
    /// Clusters created.
    pub clusters_created: usize,
    /// Clusters destroyed after losing their last member.
    pub clusters_destroyed: usize,
    /// Full re-clustering passes.
    pub reclusters: usize,
}

impl ClusteringStatistics {
    /// Mean number of markers per cluster, given the current totals.
    #[must_use]
    pub fn mean_cluster_size(markers: usize, clusters: usize) -> f64 {
        if clusters == 0 {
            0.0
        } else {
            markers as f64 / clusters as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clustering_config() {
        let config = ClusteringConfig::new()
            .with_radius(2.0)
            .with_cell_scale(1.5);

        assert!((config.radius - 2.0).abs() < f64::EPSILON);
        assert!((config.cell_size() - 3.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert_eq!(
            ClusteringConfig::new().with_radius(0.0).validate(),
            Err(Error::InvalidRadius(0.0))
        );
        assert!(ClusteringConfig::new()
            .with_radius(f64::NAN)
            .validate()
            .is_err());
        assert!(matches!(
            ClusteringConfig::new().with_cell_scale(0.5).validate(),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_pixels_to_degrees() {
        // 256 px at zoom 0 is the whole world.
        assert_relative_eq!(pixels_to_degrees(256.0, 0.0), 360.0);
        // Every zoom level halves the span.
        assert_relative_eq!(pixels_to_degrees(40.0, 3.0), 40.0 * 360.0 / 2048.0);

        let config = ClusteringConfig::for_zoom(1.0, 128.0);
        assert_relative_eq!(config.radius, 90.0);
    }

    #[test]
    fn test_mean_cluster_size() {
        assert_relative_eq!(ClusteringStatistics::mean_cluster_size(10, 4), 2.5);
        assert_relative_eq!(ClusteringStatistics::mean_cluster_size(10, 0), 0.0);
    }
}
