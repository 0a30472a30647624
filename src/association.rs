//! Nearest-camera association for magnetometer stations.
//!
//! Distances are planar Euclidean in degree space, `hypot(Δlat, Δlon)`.
//! There is no cos(latitude) correction on longitude and no great-circle
//! geometry. The stations all sit in a narrow mid-latitude band (≈35–65°N)
//! where the distortion is small, and renderers expect exactly this ranking,
//! so the metric must stay as is.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use crate::data::model::{Camera, CameraSet, Coordinates, Magnetometer, MagnetometerSet, Station};

/// Planar distance in degrees between two positions.
pub fn degree_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    (a.latitude - b.latitude).hypot(a.longitude - b.longitude)
}

// ---------------------------------------------------------------------------
// Association records
// ---------------------------------------------------------------------------

/// One ranked camera candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub camera_id: String,
}

/// Cameras associated with a single magnetometer.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub magnetometer_id: String,
    /// Globally closest camera; `None` only when there are no cameras.
    pub best: Option<Neighbor>,
    /// Up to `k` cameras, ascending by distance.
    pub neighbors: Vec<Neighbor>,
}

// ---------------------------------------------------------------------------
// Bounded selection
// ---------------------------------------------------------------------------

/// Heap entry: distance, then camera position in the collection, so equal
/// distances keep iteration order.
type Candidate = (OrderedFloat<f64>, usize);

/// The `k` smallest candidates, ascending. Keeps a max-heap of size `k`
/// whose root is the current worst kept candidate.
fn k_smallest(candidates: impl Iterator<Item = Candidate>, k: usize) -> Vec<Candidate> {
    if k == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
    for candidate in candidates {
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }
    heap.into_sorted_vec()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Rank every camera for one magnetometer and keep the `k` closest.
pub fn associate_one(magnetometer: &Magnetometer, cameras: &[Camera], k: usize) -> Association {
    let origin = magnetometer.coordinates();
    let candidates = cameras
        .iter()
        .enumerate()
        .map(|(index, cam)| (OrderedFloat(degree_distance(&origin, &cam.coordinates())), index));

    let to_neighbor = |(distance, index): Candidate| Neighbor {
        distance: distance.into_inner(),
        camera_id: cameras[index].id().to_string(),
    };

    let best = candidates.clone().min().map(to_neighbor);
    let neighbors = k_smallest(candidates, k).into_iter().map(to_neighbor).collect();

    Association {
        magnetometer_id: magnetometer.id().to_string(),
        best,
        neighbors,
    }
}

/// Associate every magnetometer with its `k` nearest cameras, in
/// magnetometer collection order.
///
/// O(n·m) distance evaluations for n cameras and m magnetometers.
pub fn associate(magnetometers: &MagnetometerSet, cameras: &CameraSet, k: usize) -> Vec<Association> {
    magnetometers
        .iter()
        .map(|mag| associate_one(mag, cameras.as_slice(), k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::Series;

    fn at(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    fn cameras(points: &[(&str, f64, f64)]) -> CameraSet {
        CameraSet::from_stations(
            points
                .iter()
                .map(|(id, lat, lon)| Camera::new(*id, at(*lat, *lon), Series::default()))
                .collect(),
        )
    }

    fn magnetometers(points: &[(&str, f64, f64)]) -> MagnetometerSet {
        MagnetometerSet::from_stations(
            points
                .iter()
                .map(|(id, lat, lon)| Magnetometer::new(*id, at(*lat, *lon), Series::default()))
                .collect(),
        )
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_identity() {
        let a = at(46.0, 5.0);
        let b = at(44.0, 3.0);
        assert_eq!(degree_distance(&a, &b), degree_distance(&b, &a));
        assert_eq!(degree_distance(&a, &a), 0.0);
        assert!(degree_distance(&a, &b) > 0.0);
    }

    #[test]
    fn nearest_camera_scenario() {
        let cams = cameras(&[("C1", 46.0, 5.0), ("C2", 44.0, 3.0)]);
        let mags = magnetometers(&[("M", 45.5, 4.5)]);

        let assoc = associate(&mags, &cams, 1);
        assert_eq!(assoc.len(), 1);
        let best = assoc[0].best.as_ref().expect("a camera exists");
        assert_eq!(best.camera_id, "C1");
        assert!((best.distance - 0.5f64.hypot(0.5)).abs() < 1e-12);
        assert!((best.distance - 0.707).abs() < 1e-3);
        assert_eq!(assoc[0].neighbors, vec![best.clone()]);
    }

    #[test]
    fn first_neighbor_matches_exhaustive_minimum() {
        let cams = cameras(&[
            ("A", 48.1, -1.7),
            ("B", 43.6, 1.4),
            ("C", 45.8, 4.8),
            ("D", 50.6, 3.1),
            ("E", 47.2, -1.6),
            ("F", 44.8, -0.6),
        ]);
        let mags = magnetometers(&[("CLF", 48.0, 2.3), ("EBR", 40.8, 0.5), ("HAD", 51.0, -4.5)]);

        for assoc in associate(&mags, &cams, 3) {
            let mag = mags.get(&assoc.magnetometer_id).unwrap();
            let exhaustive = cams
                .iter()
                .map(|c| (degree_distance(&mag.coordinates(), &c.coordinates()), c.id()))
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .unwrap();
            assert_eq!(assoc.neighbors[0].camera_id, exhaustive.1);
            assert_eq!(assoc.best.as_ref().unwrap().camera_id, exhaustive.1);
            assert_eq!(assoc.neighbors.len(), 3);
            assert!(assoc.neighbors.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn k_zero_gives_empty_lists() {
        let cams = cameras(&[("A", 46.0, 5.0)]);
        let mags = magnetometers(&[("M1", 45.0, 5.0), ("M2", 47.0, 5.0)]);
        for assoc in associate(&mags, &cams, 0) {
            assert!(assoc.neighbors.is_empty());
        }
    }

    #[test]
    fn k_above_camera_count_returns_all_sorted() {
        let cams = cameras(&[("FAR", 60.0, 20.0), ("NEAR", 45.1, 5.0), ("MID", 47.0, 6.0)]);
        let mags = magnetometers(&[("M", 45.0, 5.0)]);
        let assoc = &associate(&mags, &cams, 10)[0];
        let ids: Vec<_> = assoc.neighbors.iter().map(|n| n.camera_id.as_str()).collect();
        assert_eq!(ids, vec!["NEAR", "MID", "FAR"]);
    }

    #[test]
    fn no_cameras_means_no_association() {
        let mags = magnetometers(&[("M", 45.0, 5.0)]);
        let assoc = &associate(&mags, &CameraSet::default(), 3)[0];
        assert_eq!(assoc.best, None);
        assert!(assoc.neighbors.is_empty());
    }

    #[test]
    fn ties_keep_collection_order() {
        // All four cameras are exactly 1° away.
        let cams = cameras(&[("N", 46.0, 5.0), ("E", 45.0, 6.0), ("S", 44.0, 5.0), ("W", 45.0, 4.0)]);
        let mags = magnetometers(&[("M", 45.0, 5.0)]);
        let assoc = &associate(&mags, &cams, 2)[0];
        let ids: Vec<_> = assoc.neighbors.iter().map(|n| n.camera_id.as_str()).collect();
        assert_eq!(ids, vec!["N", "E"]);
        assert_eq!(assoc.best.as_ref().unwrap().camera_id, "N");
    }

    #[test]
    fn bounded_selection_keeps_smallest_in_order() {
        let candidates = [(3.0, 0), (1.0, 1), (2.0, 2), (1.0, 3), (0.5, 4)]
            .into_iter()
            .map(|(d, i)| (OrderedFloat(d), i));
        let kept: Vec<usize> = k_smallest(candidates, 3).into_iter().map(|(_, i)| i).collect();
        assert_eq!(kept, vec![4, 1, 3]);
    }
}
