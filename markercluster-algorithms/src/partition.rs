//! Deterministic from-scratch clustering of a marker set.

use std::cmp::Ordering;
use std::collections::HashSet;

use markercluster_core::{ClusteringConfig, Marker, MarkerCluster, Result};
use rayon::prelude::*;

use crate::ClusterIndex;

/// Inputs at least this large are sorted on the rayon pool.
pub const PARALLEL_SORT_THRESHOLD: usize = 4096;

/// Canonical marker order: latitude, then longitude, then id.
#[must_use]
pub fn canonical_cmp(a: &Marker, b: &Marker) -> Ordering {
    a.coord
        .lat
        .total_cmp(&b.coord.lat)
        .then_with(|| a.coord.lon.total_cmp(&b.coord.lon))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort markers into canonical order.
pub fn canonical_order(markers: &mut [Marker]) {
    if markers.len() >= PARALLEL_SORT_THRESHOLD {
        markers.par_sort_unstable_by(canonical_cmp);
    } else {
        markers.sort_unstable_by(canonical_cmp);
    }
}

/// Cluster a marker set from scratch.
///
/// The result depends only on the set of markers and the configuration,
/// never on the order of `markers`. When an id appears more than once, the
/// occurrence that sorts first wins. Markers with invalid coordinates are
/// skipped.
///
/// # Errors
/// Returns an error if the configuration is invalid.
pub fn partition(mut markers: Vec<Marker>, config: &ClusteringConfig) -> Result<Vec<MarkerCluster>> {
    let mut index = ClusterIndex::new(config.clone())?;
    canonical_order(&mut markers);

    let mut seen = HashSet::with_capacity(markers.len());
    markers.retain(|m| seen.insert(m.id));
    index.add_markers(&markers);

    Ok(index.into_clusters())
}
