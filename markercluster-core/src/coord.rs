//! Geographic coordinates.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Latitude bound in degrees.
pub const MAX_LATITUDE: f64 = 90.0;
/// Longitude bound in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;

/// A geographic coordinate in degrees.
///
/// Distances between coordinates are planar (`Δlat² + Δlon²` in degrees).
/// That is not geodesically correct for large spans or near the poles, but
/// clusters are spatially compact at the zoom levels they are drawn at.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoCoord {
    /// Latitude, in [-90, 90].
    pub lat: f64,
    /// Longitude, in [-180, 180].
    pub lon: f64,
}

impl GeoCoord {
    /// Creates a coordinate without validating it.
    #[inline]
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Creates a coordinate, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] when validation fails.
    pub fn try_new(lat: f64, lon: f64) -> Result<Self> {
        Self::new(lat, lon).validate()
    }

    /// Returns true if both axes are finite and inside their ranges.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat)
            && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&self.lon)
    }

    /// Returns the coordinate unchanged if it is valid.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinate`] when the coordinate is invalid.
    pub fn validate(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// Squared planar distance in degrees².
    #[inline]
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> f64 {
        let dlat = self.lat - other.lat;
        let dlon = self.lon - other.lon;
        dlat * dlat + dlon * dlon
    }

    /// Planar distance in degrees.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<(f64, f64)> for GeoCoord {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::new(lat, lon)
    }
}
