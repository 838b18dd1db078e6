//! Marker identity and marker events.

use std::fmt;

use crate::GeoCoord;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a marker, assigned by the map layer that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MarkerId(pub u64);

impl MarkerId {
    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for MarkerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point of interest on the map.
///
/// This is a value handle: the marker object itself lives in the map layer,
/// clusters only record the identity and the coordinate they were given.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Marker {
    /// Marker identity.
    pub id: MarkerId,
    /// Marker position.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub coord: GeoCoord,
}

impl Marker {
    /// Creates a marker from a raw id and a latitude/longitude pair.
    #[inline]
    #[must_use]
    pub fn new(id: u64, lat: f64, lon: f64) -> Self {
        Self {
            id: MarkerId(id),
            coord: GeoCoord::new(lat, lon),
        }
    }

    /// Creates a marker from an id and an existing coordinate.
    #[inline]
    #[must_use]
    pub fn at(id: MarkerId, coord: GeoCoord) -> Self {
        Self { id, coord }
    }
}

/// Whether an event adds or removes its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EventKind {
    /// Marker appears on the map.
    Add,
    /// Marker disappears from the map.
    Remove,
}

/// A marker creation or removal, as delivered by data-loading collaborators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkerEvent {
    /// Add or remove.
    #[cfg_attr(feature = "serde", serde(rename = "op"))]
    pub kind: EventKind,
    /// Marker the event applies to.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub marker: Marker,
}

impl MarkerEvent {
    /// Creates an add event.
    #[must_use]
    pub fn add(marker: Marker) -> Self {
        Self {
            kind: EventKind::Add,
            marker,
        }
    }

    /// Creates a remove event.
    #[must_use]
    pub fn remove(marker: Marker) -> Self {
        Self {
            kind: EventKind::Remove,
            marker,
        }
    }
}
