//! The cluster index: assigns markers to clusters and owns every cluster.
//!
//! Key characteristics:
//! - Join rule: a marker joins the nearest cluster whose center lies within
//!   the radius (ties go to the lowest cluster id), otherwise it starts a
//!   singleton cluster
//! - Candidate clusters come from a spatial grid keyed by center, so an
//!   insert only inspects the 3x3 cell neighborhood
//! - Radius changes re-derive the partition from scratch in canonical marker
//!   order, which makes the result independent of insertion history

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use markercluster_core::{
    ClusterId, ClusterSummary, ClusteringConfig, ClusteringStatistics, EventKind, GeoCoord,
    LogNotifier, Marker, MarkerCluster, MarkerEvent, MarkerId, Notifier, Result,
};
use rayon::prelude::*;

use crate::partition::canonical_order;
use crate::spatial::SpatialGrid;

/// Owner of all clusters for one map layer.
///
/// All mutation goes through `&mut self`; the index is meant to be driven
/// from a single context. Background loaders hand their batches over via
/// [`crate::MarkerFeed`].
pub struct ClusterIndex {
    config: ClusteringConfig,
    clusters: BTreeMap<ClusterId, MarkerCluster>,
    assignments: HashMap<MarkerId, ClusterId>,
    grid: SpatialGrid<ClusterId>,
    next_id: u32,
    stats: ClusteringStatistics,
    notifier: Arc<dyn Notifier>,
}

impl ClusterIndex {
    /// Create an index that reports through the `log` facade.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Create an index that reports rejected input through `notifier`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_notifier(config: ClusteringConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config, notifier))
    }

    fn with_valid_config(config: ClusteringConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            grid: SpatialGrid::new(config.cell_size()),
            config,
            clusters: BTreeMap::new(),
            assignments: HashMap::new(),
            next_id: 0,
            stats: ClusteringStatistics::default(),
            notifier,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Current clustering radius in degrees.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.config.radius
    }

    /// The notifier this index reports through.
    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Add a marker, joining the nearest cluster within the radius or
    /// creating a new one.
    ///
    /// Re-adding a marker with its recorded coordinate is a no-op. Re-adding
    /// it with a different coordinate moves it.
    ///
    /// # Errors
    /// Returns `Error::InvalidCoordinate` if the coordinate is out of range
    /// or not finite. The index is left unchanged.
    pub fn add_marker(&mut self, marker: Marker) -> Result<ClusterId> {
        if let Err(err) = marker.coord.validate() {
            self.stats.markers_rejected += 1;
            log::debug!("rejected marker {}: {err}", marker.id);
            return Err(err);
        }
        Ok(self.insert_valid(marker))
    }

    /// Add a batch of markers in order.
    ///
    /// Markers with invalid coordinates are skipped and reported once
    /// through the notifier. Returns the number of markers accepted.
    pub fn add_markers(&mut self, markers: &[Marker]) -> usize {
        let (valid, invalid): (Vec<Marker>, Vec<Marker>) =
            markers.par_iter().partition(|m| m.coord.is_valid());

        for marker in &valid {
            self.insert_valid(*marker);
        }

        if !invalid.is_empty() {
            self.stats.markers_rejected += invalid.len();
            self.notifier.notify(&format!(
                "skipped {} marker(s) with invalid coordinates",
                invalid.len()
            ));
        }
        valid.len()
    }

    fn insert_valid(&mut self, marker: Marker) -> ClusterId {
        if let Some(&cluster_id) = self.assignments.get(&marker.id) {
            let recorded = self
                .clusters
                .get(&cluster_id)
                .and_then(|cluster| cluster.coord_of(marker.id));
            if recorded == Some(marker.coord) {
                return cluster_id;
            }
            self.detach(marker.id);
        }

        let cluster_id = self.place(marker);
        self.assignments.insert(marker.id, cluster_id);
        self.stats.markers_added += 1;
        cluster_id
    }

    /// Remove a marker. Returns the removed marker, or `None` if it was not
    /// indexed. A cluster that loses its last member is destroyed.
    pub fn remove_marker(&mut self, id: MarkerId) -> Option<Marker> {
        let removed = self.detach(id)?;
        self.stats.markers_removed += 1;
        Some(removed)
    }

    /// Apply a single marker event.
    ///
    /// # Errors
    /// Returns `Error::InvalidCoordinate` for an add event with an invalid
    /// coordinate.
    pub fn apply(&mut self, event: MarkerEvent) -> Result<()> {
        match event.kind {
            EventKind::Add => self.add_marker(event.marker).map(|_| ()),
            EventKind::Remove => {
                self.remove_marker(event.marker.id);
                Ok(())
            }
        }
    }

    /// Apply events in order. Rejected events are reported once through the
    /// notifier. Returns the number of events applied.
    pub fn apply_all<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = MarkerEvent>,
    {
        let mut applied = 0;
        let mut rejected = 0;
        for event in events {
            match self.apply(event) {
                Ok(()) => applied += 1,
                Err(_) => rejected += 1,
            }
        }
        if rejected > 0 {
            self.notifier.notify(&format!(
                "skipped {rejected} marker event(s) with invalid coordinates"
            ));
        }
        applied
    }

    /// Change the clustering radius, re-clustering if it differs from the
    /// current one. Returns whether a re-cluster happened.
    ///
    /// # Errors
    /// Returns `Error::InvalidRadius` if the radius is not a positive
    /// finite number. The index is left unchanged.
    pub fn set_radius(&mut self, radius: f64) -> Result<bool> {
        if radius.to_bits() == self.config.radius.to_bits() {
            return Ok(false);
        }
        let config = self.config.clone().with_radius(radius);
        config.validate()?;
        self.config = config;
        self.recluster();
        Ok(true)
    }

    /// Replace the configuration and re-cluster.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn set_config(&mut self, config: ClusteringConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.recluster();
        Ok(())
    }

    /// Re-derive every cluster from scratch.
    ///
    /// Markers are replayed through the join rule in canonical order, so the
    /// same marker set and radius always yield the same clusters with the
    /// same ids.
    pub fn recluster(&mut self) {
        let mut markers: Vec<Marker> = self
            .clusters
            .values()
            .flat_map(MarkerCluster::markers)
            .collect();
        canonical_order(&mut markers);

        self.clusters.clear();
        self.assignments.clear();
        self.grid = SpatialGrid::new(self.config.cell_size());
        self.next_id = 0;

        for marker in markers {
            let cluster_id = self.place(marker);
            self.assignments.insert(marker.id, cluster_id);
        }

        self.stats.reclusters += 1;
        log::debug!(
            "reclustered {} markers into {} clusters at radius {}",
            self.assignments.len(),
            self.clusters.len(),
            self.config.radius
        );
    }

    /// Remove every marker and cluster. Statistics are kept.
    pub fn clear(&mut self) {
        self.clusters.clear();
        self.assignments.clear();
        self.grid.clear();
        self.next_id = 0;
    }

    /// Snapshot of every cluster for the renderer, ordered by id.
    #[must_use]
    pub fn clusters(&self) -> Vec<ClusterSummary> {
        self.clusters
            .iter()
            .filter_map(|(&id, cluster)| {
                cluster.center().map(|center| ClusterSummary {
                    id,
                    center,
                    count: cluster.len(),
                })
            })
            .collect()
    }

    /// Iterate over clusters in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &MarkerCluster)> + '_ {
        self.clusters.iter().map(|(&id, cluster)| (id, cluster))
    }

    /// Look up a cluster.
    #[must_use]
    pub fn cluster(&self, id: ClusterId) -> Option<&MarkerCluster> {
        self.clusters.get(&id)
    }

    /// Cluster a marker currently belongs to.
    #[must_use]
    pub fn cluster_of(&self, marker: MarkerId) -> Option<ClusterId> {
        self.assignments.get(&marker).copied()
    }

    /// Member ids of every cluster, in cluster id order.
    #[must_use]
    pub fn membership(&self) -> Vec<Vec<MarkerId>> {
        self.clusters
            .values()
            .map(|cluster| cluster.markers().map(|m| m.id).collect())
            .collect()
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Returns true if the index holds no clusters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of indexed markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.assignments.len()
    }

    /// Counters accumulated since creation.
    #[must_use]
    pub fn statistics(&self) -> &ClusteringStatistics {
        &self.stats
    }

    /// Consume the index, returning its clusters in id order.
    #[must_use]
    pub fn into_clusters(self) -> Vec<MarkerCluster> {
        self.clusters.into_values().collect()
    }

    fn nearest_cluster(&self, coord: GeoCoord) -> Option<ClusterId> {
        let radius_sq = self.config.radius * self.config.radius;
        let mut best: Option<(f64, ClusterId)> = None;

        for id in self.grid.query_neighborhood(coord) {
            let Some(center) = self.clusters.get(&id).and_then(MarkerCluster::center) else {
                continue;
            };
            let dist_sq = center.distance_squared(&coord);
            if dist_sq > radius_sq {
                continue;
            }
            let closer = match best {
                None => true,
                Some((best_dist, best_id)) => {
                    dist_sq.total_cmp(&best_dist).then(id.cmp(&best_id)).is_lt()
                }
            };
            if closer {
                best = Some((dist_sq, id));
            }
        }

        best.map(|(_, id)| id)
    }

    fn place(&mut self, marker: Marker) -> ClusterId {
        if let Some(id) = self.nearest_cluster(marker.coord) {
            if let Some(cluster) = self.clusters.get_mut(&id) {
                let before = cluster.center();
                cluster.add_marker(marker);
                if let (Some(from), Some(to)) = (before, cluster.center()) {
                    self.grid.relocate(from, to, id);
                }
                self.stats.joins += 1;
                return id;
            }
        }

        let id = ClusterId(self.next_id);
        self.next_id += 1;
        self.clusters.insert(id, MarkerCluster::with_marker(marker));
        self.grid.insert(marker.coord, id);
        self.stats.clusters_created += 1;
        id
    }

    fn detach(&mut self, id: MarkerId) -> Option<Marker> {
        let cluster_id = self.assignments.remove(&id)?;
        let cluster = self.clusters.get_mut(&cluster_id)?;
        let before = cluster.center();
        let removed = cluster.remove_marker(id)?;

        match (before, cluster.center()) {
            (Some(from), None) => {
                self.grid.remove(from, cluster_id);
                self.clusters.remove(&cluster_id);
                self.stats.clusters_destroyed += 1;
            }
            (Some(from), Some(to)) => self.grid.relocate(from, to, cluster_id),
            _ => {}
        }
        Some(removed)
    }
}

impl fmt::Debug for ClusterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterIndex")
            .field("config", &self.config)
            .field("clusters", &self.clusters.len())
            .field("markers", &self.assignments.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Default for ClusterIndex {
    fn default() -> Self {
        Self::with_valid_config(ClusteringConfig::default(), Arc::new(LogNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use markercluster_core::{Error, MemoryNotifier};

    fn index(radius: f64) -> ClusterIndex {
        ClusterIndex::new(ClusteringConfig::new().with_radius(radius)).unwrap()
    }

    #[test]
    fn test_join_nearby_and_singleton_far() {
        let mut index = index(0.5);
        let a = index.add_marker(Marker::new(1, 10.0, 10.0)).unwrap();
        let b = index.add_marker(Marker::new(2, 10.0, 10.2)).unwrap();
        let c = index.add_marker(Marker::new(3, 10.0, 50.0)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(index.len(), 2);

        let center = index.cluster(a).unwrap().center().unwrap();
        assert_relative_eq!(center.lat, 10.0, epsilon = 1e-12);
        assert_relative_eq!(center.lon, 10.1, epsilon = 1e-12);
        assert_eq!(index.cluster(c).unwrap().len(), 1);
    }

    #[test]
    fn test_tie_goes_to_lowest_cluster_id() {
        let mut index = index(1.0);
        let left = index.add_marker(Marker::new(1, 0.0, -0.8)).unwrap();
        let right = index.add_marker(Marker::new(2, 0.0, 0.8)).unwrap();
        assert_ne!(left, right);

        let joined = index.add_marker(Marker::new(3, 0.0, 0.0)).unwrap();
        assert_eq!(joined, left.min(right));
    }

    #[test]
    fn test_join_across_cell_boundary() {
        let mut index = index(0.5);
        let a = index.add_marker(Marker::new(1, 0.49, 0.49)).unwrap();
        let b = index.add_marker(Marker::new(2, 0.51, 0.51)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let mut index = index(0.5);
        let err = index.add_marker(Marker::new(1, 95.0, 0.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinate { .. }));
        assert!(index.is_empty());
        assert_eq!(index.statistics().markers_rejected, 1);

        assert!(index.add_marker(Marker::new(2, 0.0, f64::NAN)).is_err());
        assert_eq!(index.marker_count(), 0);
    }

    #[test]
    fn test_readd_same_marker_is_noop() {
        let mut index = index(0.5);
        let first = index.add_marker(Marker::new(1, 1.0, 1.0)).unwrap();
        let second = index.add_marker(Marker::new(1, 1.0, 1.0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(index.marker_count(), 1);
        assert_eq!(index.statistics().markers_added, 1);
    }

    #[test]
    fn test_readd_with_new_coordinate_moves_marker() {
        let mut index = index(0.5);
        let first = index.add_marker(Marker::new(1, 1.0, 1.0)).unwrap();
        let moved = index.add_marker(Marker::new(1, 40.0, 40.0)).unwrap();

        assert_ne!(first, moved);
        assert_eq!(index.len(), 1);
        assert_eq!(index.cluster_of(MarkerId(1)), Some(moved));
        assert_eq!(
            index.cluster(moved).unwrap().center(),
            Some(GeoCoord::new(40.0, 40.0))
        );
    }

    #[test]
    fn test_removing_last_member_destroys_cluster() {
        let mut index = index(0.5);
        let id = index.add_marker(Marker::new(1, 5.0, 5.0)).unwrap();
        index.add_marker(Marker::new(2, 5.1, 5.0)).unwrap();

        index.remove_marker(MarkerId(1));
        assert_eq!(index.cluster(id).unwrap().len(), 1);

        let removed = index.remove_marker(MarkerId(2));
        assert_eq!(removed, Some(Marker::new(2, 5.1, 5.0)));
        assert!(index.cluster(id).is_none());
        assert!(index.is_empty());
        assert_eq!(index.statistics().clusters_destroyed, 1);
        assert_eq!(index.remove_marker(MarkerId(2)), None);
    }

    #[test]
    fn test_removed_cluster_leaves_grid() {
        let mut index = index(0.5);
        index.add_marker(Marker::new(1, 5.0, 5.0)).unwrap();
        index.remove_marker(MarkerId(1));

        let fresh = index.add_marker(Marker::new(2, 5.0, 5.0)).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.cluster(fresh).unwrap().len(), 1);
    }

    #[test]
    fn test_shrinking_radius_splits_cluster() {
        let mut index = index(1.0);
        index.add_marker(Marker::new(1, 0.0, 0.0)).unwrap();
        index.add_marker(Marker::new(2, 0.0, 0.5)).unwrap();
        assert_eq!(index.len(), 1);

        assert!(index.set_radius(0.1).unwrap());
        assert_eq!(index.len(), 2);
        let mut all: Vec<MarkerId> = index.membership().into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, vec![MarkerId(1), MarkerId(2)]);
    }

    #[test]
    fn test_growing_radius_merges_clusters() {
        let mut index = index(0.1);
        for (i, lon) in [0.0, 0.3, 0.6].into_iter().enumerate() {
            index.add_marker(Marker::new(i as u64, 0.0, lon)).unwrap();
        }
        assert_eq!(index.len(), 3);

        index.set_radius(2.0).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.clusters()[0].count, 3);
        assert_relative_eq!(index.clusters()[0].center.lon, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_set_radius_unchanged_and_invalid() {
        let mut index = index(0.5);
        index.add_marker(Marker::new(1, 0.0, 0.0)).unwrap();
        assert!(!index.set_radius(0.5).unwrap());
        assert_eq!(index.statistics().reclusters, 0);

        assert_eq!(index.set_radius(-1.0), Err(Error::InvalidRadius(-1.0)));
        assert_relative_eq!(index.radius(), 0.5);
    }

    #[test]
    fn test_add_markers_notifies_rejections() {
        let notifier = Arc::new(MemoryNotifier::new());
        let mut index =
            ClusterIndex::with_notifier(ClusteringConfig::new().with_radius(0.5), notifier.clone())
                .unwrap();

        let accepted = index.add_markers(&[
            Marker::new(1, 0.0, 0.0),
            Marker::new(2, 200.0, 0.0),
            Marker::new(3, 0.1, 0.0),
        ]);
        assert_eq!(accepted, 2);
        assert_eq!(index.marker_count(), 2);
        assert_eq!(
            notifier.messages(),
            vec!["skipped 1 marker(s) with invalid coordinates"]
        );
    }

    #[test]
    fn test_apply_events() {
        let notifier = Arc::new(MemoryNotifier::new());
        let mut index =
            ClusterIndex::with_notifier(ClusteringConfig::new().with_radius(0.5), notifier.clone())
                .unwrap();
        let applied = index.apply_all([
            MarkerEvent::add(Marker::new(1, 0.0, 0.0)),
            MarkerEvent::add(Marker::new(2, 0.0, 0.2)),
            MarkerEvent::add(Marker::new(3, f64::INFINITY, 0.0)),
            MarkerEvent::remove(Marker::new(1, 0.0, 0.0)),
        ]);

        assert_eq!(applied, 3);
        assert_eq!(index.marker_count(), 1);
        assert_eq!(index.clusters()[0].center, GeoCoord::new(0.0, 0.2));
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn test_clear_keeps_statistics() {
        let mut index = index(0.5);
        index.add_marker(Marker::new(1, 0.0, 0.0)).unwrap();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.marker_count(), 0);
        assert_eq!(index.statistics().markers_added, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ClusterIndex::new(ClusteringConfig::new().with_radius(0.0)).is_err());
    }

    #[test]
    fn test_tiny_radius_joins_colocated_markers() {
        let mut index = index(1e-20);
        let a = index.add_marker(Marker::new(1, 10.0, 10.0)).unwrap();
        let b = index.add_marker(Marker::new(2, 10.0, 10.0)).unwrap();
        let c = index.add_marker(Marker::new(3, -10.0, -10.0)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(index.len(), 2);
        assert!(index.set_radius(1e-21).unwrap());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_add_markers_moves_readded_marker() {
        let mut index = index(0.5);
        let accepted = index.add_markers(&[
            Marker::new(1, 0.0, 0.0),
            Marker::new(1, 0.0, 0.0),
            Marker::new(1, 20.0, 20.0),
        ]);

        assert_eq!(accepted, 3);
        assert_eq!(index.marker_count(), 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.clusters()[0].center, GeoCoord::new(20.0, 20.0));

        let stats = index.statistics();
        assert_eq!(stats.markers_added, 2);
        assert_eq!(stats.clusters_created, 2);
        assert_eq!(stats.clusters_destroyed, 1);
    }

    #[test]
    fn test_default_index_uses_default_config() {
        let mut index = ClusterIndex::default();
        assert_eq!(index.config(), &ClusteringConfig::default());
        assert!(index.is_empty());
        index.add_marker(Marker::new(1, 0.0, 0.0)).unwrap();
        index.add_marker(Marker::new(2, 0.0, 0.3)).unwrap();
        assert_eq!(index.len(), 1);
    }
}
