//! Spatial bucketing for cluster center lookup.
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;

use markercluster_core::GeoCoord;

/// Grid cell key: `(floor(lat / cell), floor(lon / cell))`.
pub type CellKey = (i64, i64);

/// Spatial grid for 2D neighbor queries over geographic coordinates.
///
/// With a cell size of at least the clustering radius, every point within
/// the radius of a query coordinate lies in the 3x3 block of cells around
/// it.
#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell_size: f64,
    cells: HashMap<CellKey, Vec<T>>,
    len: usize,
}

impl<T: Copy + PartialEq> SpatialGrid<T> {
    /// Create a new spatial grid with the given cell size in degrees.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    /// Cell size in degrees.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the grid holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    /// Cell containing a coordinate.
    #[must_use]
    pub fn cell_of(&self, coord: GeoCoord) -> CellKey {
        (
            (coord.lat / self.cell_size).floor() as i64,
            (coord.lon / self.cell_size).floor() as i64,
        )
    }

    /// Insert a value at the given coordinate.
    pub fn insert(&mut self, coord: GeoCoord, value: T) {
        let cell = self.cell_of(coord);
        self.cells.entry(cell).or_default().push(value);
        self.len += 1;
    }

    /// Remove a value previously inserted at the given coordinate.
    ///
    /// Returns false if the value was not found in that cell.
    pub fn remove(&mut self, coord: GeoCoord, value: T) -> bool {
        let cell = self.cell_of(coord);
        let Some(values) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(pos) = values.iter().position(|v| *v == value) else {
            return false;
        };

        values.swap_remove(pos);
        if values.is_empty() {
            self.cells.remove(&cell);
        }
        self.len -= 1;
        true
    }

    /// Move a value whose coordinate changed. No-op when both coordinates
    /// fall in the same cell.
    pub fn relocate(&mut self, from: GeoCoord, to: GeoCoord, value: T) {
        if self.cell_of(from) == self.cell_of(to) {
            return;
        }
        if self.remove(from, value) {
            self.insert(to, value);
        }
    }

    /// Query the 3x3 neighborhood around a coordinate.
    ///
    /// Cell keys saturate for very small cell sizes; neighbors past the
    /// `i64` range do not exist and are skipped.
    pub fn query_neighborhood(&self, coord: GeoCoord) -> impl Iterator<Item = T> + '_ {
        let (clat, clon) = self.cell_of(coord);
        (-1..=1)
            .flat_map(move |dlat: i64| {
                (-1..=1).filter_map(move |dlon: i64| {
                    Some((clat.checked_add(dlat)?, clon.checked_add(dlon)?))
                })
            })
            .filter_map(|cell| self.cells.get(&cell))
            .flat_map(|values| values.iter().copied())
    }
}
