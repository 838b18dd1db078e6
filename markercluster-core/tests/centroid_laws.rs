#![allow(clippy::cast_precision_loss)]
use markercluster_core::{GeoCoord, Marker, MarkerCluster, MarkerId};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

fn coord_strategy() -> impl Strategy<Value = (f64, f64)> {
    (-90.0f64..=90.0, -180.0f64..=180.0)
}

fn markers_from(coords: &[(f64, f64)]) -> Vec<Marker> {
    coords
        .iter()
        .enumerate()
        .map(|(i, &(lat, lon))| Marker::new(i as u64, lat, lon))
        .collect()
}

fn exact_mean(markers: &[Marker]) -> GeoCoord {
    let n = markers.len() as f64;
    let lat = markers.iter().map(|m| m.coord.lat).sum::<f64>() / n;
    let lon = markers.iter().map(|m| m.coord.lon).sum::<f64>() / n;
    GeoCoord::new(lat, lon)
}

fn close(a: GeoCoord, b: GeoCoord) -> bool {
    (a.lat - b.lat).abs() <= TOLERANCE && (a.lon - b.lon).abs() <= TOLERANCE
}

proptest! {
    #[test]
    fn center_is_mean_in_any_order(
        coords in prop::collection::vec(coord_strategy(), 1..200),
        seed in any::<u64>(),
    ) {
        let markers = markers_from(&coords);
        let forward: MarkerCluster = markers.iter().copied().collect();

        // Deterministic shuffle driven by the seed.
        let mut shuffled = markers.clone();
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }
        let reordered: MarkerCluster = shuffled.into_iter().collect();

        let mean = exact_mean(&markers);
        prop_assert!(close(forward.center().unwrap(), mean));
        prop_assert!(close(reordered.center().unwrap(), mean));
    }

    #[test]
    fn add_then_remove_restores_state(
        coords in prop::collection::vec(coord_strategy(), 1..100),
        extra in coord_strategy(),
    ) {
        let mut cluster: MarkerCluster = markers_from(&coords).into_iter().collect();
        let before_center = cluster.center().unwrap();
        let before_members: Vec<Marker> = cluster.markers().collect();

        let extra_id = MarkerId(coords.len() as u64);
        cluster.add_marker(Marker::at(extra_id, GeoCoord::new(extra.0, extra.1)));
        cluster.remove_marker(extra_id);

        prop_assert!(close(cluster.center().unwrap(), before_center));
        prop_assert_eq!(cluster.markers().collect::<Vec<_>>(), before_members);
    }

    #[test]
    fn double_add_equals_single_add(
        coords in prop::collection::vec(coord_strategy(), 1..50),
    ) {
        let markers = markers_from(&coords);
        let once: MarkerCluster = markers.iter().copied().collect();
        let mut twice = MarkerCluster::new();
        for marker in &markers {
            twice.add_marker(*marker);
            twice.add_marker(*marker);
        }

        prop_assert_eq!(once.len(), twice.len());
        prop_assert_eq!(once.center(), twice.center());
    }

    #[test]
    fn removing_everything_empties(
        coords in prop::collection::vec(coord_strategy(), 1..50),
    ) {
        let markers = markers_from(&coords);
        let mut cluster: MarkerCluster = markers.iter().copied().collect();
        for marker in &markers {
            prop_assert!(cluster.center().is_some());
            cluster.remove_marker(marker.id);
        }
        prop_assert!(cluster.is_empty());
        prop_assert!(cluster.center().is_none());
    }
}

#[test]
fn three_member_scenario() {
    let mut cluster: MarkerCluster = [
        Marker::new(1, 0.0, 0.0),
        Marker::new(2, 0.0, 2.0),
        Marker::new(3, 0.0, 4.0),
    ]
    .into_iter()
    .collect();
    assert!(close(cluster.center().unwrap(), GeoCoord::new(0.0, 2.0)));

    cluster.remove_marker(MarkerId(3));
    assert!(close(cluster.center().unwrap(), GeoCoord::new(0.0, 1.0)));
}
