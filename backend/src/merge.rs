use std::collections::{HashMap, HashSet};

use kdtree::{distance::squared_euclidean, KdTree};
use petgraph::unionfind::UnionFind;

use crate::{
    builder::BuildError,
    distance::{haversine_km, EARTH_RADIUS_KM},
    graph::VertexKey,
    models::{Coordinate, Record},
};

/// Widening of the chord search radius that absorbs rounding in the
/// Cartesian coordinates; candidates are confirmed with the haversine metric.
const CHORD_SLACK_KM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Coordinates replaced by the representative of their cluster.
    pub merged_coordinates: usize,
    /// Clusters with more than one member.
    pub clusters: usize,
}

/// Collapse near-coincident polyline coordinates before graph construction.
///
/// Every distinct coordinate within `tolerance_km` of another (transitively)
/// is rewritten to the first-seen coordinate of its cluster, and consecutive
/// duplicates produced by the rewrite are dropped. Records without a polyline
/// at `geometry_index` are left untouched.
pub fn merge_coincident_vertices(
    records: &mut [Record],
    geometry_index: usize,
    tolerance_km: f64,
) -> Result<MergeStats, BuildError> {
    if !tolerance_km.is_finite() || tolerance_km < 0.0 {
        return Err(BuildError::InvalidTolerance(tolerance_km));
    }

    let mut unique: Vec<Coordinate> = Vec::new();
    let mut slots: HashMap<VertexKey, usize> = HashMap::new();
    for polyline in records.iter().filter_map(|r| r.polyline(geometry_index)) {
        for &coord in polyline {
            slots.entry(VertexKey::from(coord)).or_insert_with(|| {
                unique.push(coord);
                unique.len() - 1
            });
        }
    }

    if unique.len() < 2 {
        return Ok(MergeStats::default());
    }

    let points: Vec<[f64; 3]> = unique.iter().map(|c| to_cartesian_km(*c)).collect();
    let mut tree = KdTree::new(3);
    for (idx, point) in points.iter().enumerate() {
        tree.add(*point, idx).map_err(BuildError::SpatialIndex)?;
    }

    let radius = chord_km(tolerance_km) + CHORD_SLACK_KM;
    let mut clusters = UnionFind::<usize>::new(unique.len());
    for (idx, coord) in unique.iter().enumerate() {
        let candidates = tree
            .within(&points[idx], radius * radius, &squared_euclidean)
            .map_err(BuildError::SpatialIndex)?;
        for (_, &other) in candidates {
            if other != idx && haversine_km(*coord, unique[other]) <= tolerance_km {
                clusters.union(idx, other);
            }
        }
    }

    // Lowest index of each cluster is its first-seen coordinate
    let mut representative_of_root: HashMap<usize, usize> = HashMap::new();
    let representative: Vec<usize> = (0..unique.len())
        .map(|idx| *representative_of_root.entry(clusters.find(idx)).or_insert(idx))
        .collect();

    let merged: Vec<usize> = (0..unique.len())
        .filter(|&idx| representative[idx] != idx)
        .collect();
    let stats = MergeStats {
        merged_coordinates: merged.len(),
        clusters: merged
            .iter()
            .map(|&idx| representative[idx])
            .collect::<HashSet<_>>()
            .len(),
    };

    if stats.merged_coordinates == 0 {
        return Ok(stats);
    }

    for record in records.iter_mut() {
        let Some(polyline) = record.polyline_mut(geometry_index) else {
            continue;
        };
        for coord in polyline.iter_mut() {
            let slot = slots[&VertexKey::from(*coord)];
            *coord = unique[representative[slot]];
        }
        polyline.dedup_by_key(|coord| VertexKey::from(*coord));
    }

    tracing::debug!(
        "merged {} coordinates into {} clusters (tolerance {} km)",
        stats.merged_coordinates,
        stats.clusters,
        tolerance_km
    );

    Ok(stats)
}

/// Point on a sphere of radius [`EARTH_RADIUS_KM`]. Straight-line distance
/// between two such points grows monotonically with their great-circle
/// distance, without poles or antimeridian seams.
fn to_cartesian_km(coord: Coordinate) -> [f64; 3] {
    let (lat, lon) = (coord.lat.to_radians(), coord.lon.to_radians());
    [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ]
}

/// Chord length subtending a great-circle arc of `arc_km`.
fn chord_km(arc_km: f64) -> f64 {
    let half_angle = (arc_km / (2.0 * EARTH_RADIUS_KM)).min(std::f64::consts::FRAC_PI_2);
    2.0 * EARTH_RADIUS_KM * half_angle.sin()
}
