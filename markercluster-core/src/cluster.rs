//! A group of markers and its running centroid.
#![allow(clippy::cast_precision_loss)]

use std::collections::btree_map::{self, BTreeMap};
use std::iter::FusedIterator;

use crate::{Error, GeoCoord, Marker, MarkerId, Result};

/// Number of incremental centroid updates after which the center is
/// recomputed exactly from the members.
pub const RECENTER_INTERVAL: u32 = 1024;

/// A dynamically maintained group of markers rendered as one glyph.
///
/// The center is the per-axis arithmetic mean of member coordinates and is
/// updated incrementally on every add and remove. The mean is planar: it
/// ignores great-circle geometry and does not wrap at the antimeridian.
///
/// A cluster with no members has no center. The owning index discards
/// clusters as soon as they become empty.
#[derive(Debug, Clone, Default)]
pub struct MarkerCluster {
    members: BTreeMap<MarkerId, GeoCoord>,
    center: GeoCoord,
    updates_since_recenter: u32,
}

impl MarkerCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cluster holding a single marker.
    #[must_use]
    pub fn with_marker(marker: Marker) -> Self {
        let mut cluster = Self::new();
        cluster.add_marker(marker);
        cluster
    }

    /// Adds a marker and folds its coordinate into the center.
    ///
    /// Adding a marker that is already a member is a no-op, even if the
    /// coordinate passed differs from the recorded one. Returns whether the
    /// membership changed.
    pub fn add_marker(&mut self, marker: Marker) -> bool {
        let btree_map::Entry::Vacant(slot) = self.members.entry(marker.id) else {
            return false;
        };
        slot.insert(marker.coord);

        let n = self.members.len();
        if n == 1 {
            self.center = marker.coord;
            self.updates_since_recenter = 0;
            return true;
        }

        let weight = n as f64;
        self.center.lat += (marker.coord.lat - self.center.lat) / weight;
        self.center.lon += (marker.coord.lon - self.center.lon) / weight;
        self.note_update();
        true
    }

    /// Removes a marker and backs its coordinate out of the center.
    ///
    /// Removing a marker that is not a member is a no-op. Returns the
    /// removed marker.
    pub fn remove_marker(&mut self, id: MarkerId) -> Option<Marker> {
        let coord = self.members.remove(&id)?;

        match self.members.len() {
            0 => {
                self.center = GeoCoord::default();
                self.updates_since_recenter = 0;
            }
            1 => {
                if let Some(&last) = self.members.values().next() {
                    self.center = last;
                }
                self.updates_since_recenter = 0;
            }
            n => {
                let weight = n as f64;
                self.center.lat -= (coord.lat - self.center.lat) / weight;
                self.center.lon -= (coord.lon - self.center.lon) / weight;
                self.note_update();
            }
        }

        Some(Marker::at(id, coord))
    }

    /// Returns the centroid, or `None` once the cluster is empty.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Option<GeoCoord> {
        if self.members.is_empty() {
            None
        } else {
            Some(self.center)
        }
    }

    /// Returns the centroid.
    ///
    /// # Errors
    /// Returns [`Error::EmptyCluster`] if the cluster has no members.
    pub fn try_center(&self) -> Result<GeoCoord> {
        self.center().ok_or(Error::EmptyCluster)
    }

    /// Returns a read-only view of the members, ordered by marker id.
    #[must_use]
    pub fn markers(&self) -> Markers<'_> {
        Markers {
            inner: self.members.iter(),
        }
    }

    /// Returns the recorded coordinate of a member.
    #[must_use]
    pub fn coord_of(&self, id: MarkerId) -> Option<GeoCoord> {
        self.members.get(&id).copied()
    }

    /// Returns true if the marker is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: MarkerId) -> bool {
        self.members.contains_key(&id)
    }

    /// Returns the number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the cluster has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Recomputes the center exactly from the members.
    pub fn recenter(&mut self) {
        self.updates_since_recenter = 0;
        if self.members.is_empty() {
            self.center = GeoCoord::default();
            return;
        }

        let n = self.members.len() as f64;
        let (sum_lat, sum_lon) = self
            .members
            .values()
            .fold((0.0, 0.0), |(lat, lon), c| (lat + c.lat, lon + c.lon));
        self.center = GeoCoord::new(sum_lat / n, sum_lon / n);
    }

    fn note_update(&mut self) {
        self.updates_since_recenter += 1;
        if self.updates_since_recenter >= RECENTER_INTERVAL {
            self.recenter();
        }
    }
}

impl FromIterator<Marker> for MarkerCluster {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        let mut cluster = Self::new();
        for marker in iter {
            cluster.add_marker(marker);
        }
        cluster
    }
}

/// Iterator over the members of a [`MarkerCluster`].
#[derive(Debug, Clone)]
pub struct Markers<'a> {
    inner: btree_map::Iter<'a, MarkerId, GeoCoord>,
}

impl Iterator for Markers<'_> {
    type Item = Marker;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&id, &coord)| Marker::at(id, coord))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Markers<'_> {}

impl FusedIterator for Markers<'_> {}
