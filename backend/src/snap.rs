use crate::{
    distance::haversine_km,
    graph::{Graph, GraphError},
    models::{Coordinate, EdgeInfo, Region},
};

/// Closest vertex to `target` and its distance in km.
///
/// Linear scan in vertex insertion order; the first vertex found wins ties.
/// If `target` is itself a vertex it is returned at distance 0.
pub fn nearest_vertex(graph: &Graph, target: Coordinate) -> Result<(Coordinate, f64), GraphError> {
    let mut best: Option<(Coordinate, f64)> = None;
    for vertex in graph.vertices() {
        let distance = haversine_km(target, vertex);
        if best.map_or(true, |(_, min)| distance < min) {
            best = Some((vertex, distance));
        }
    }
    best.ok_or(GraphError::EmptyGraph)
}

/// Add each coordinate as a vertex and connect it to its nearest existing
/// vertex with an edge weighted by their distance.
///
/// The graph keeps everything attached before a failure.
pub fn attach(graph: &mut Graph, coords: &[Coordinate], info: &EdgeInfo) -> Result<(), GraphError> {
    for &coord in coords {
        let (nearest, distance_km) = nearest_vertex(graph, coord)?;
        graph.add_vertex(coord);
        graph.add_edge(coord, nearest, info.clone(), info.clone(), distance_km)?;
        tracing::trace!(?coord, ?nearest, distance_km, "snapped coordinate");
    }
    Ok(())
}

pub fn attach_region<R: Region + ?Sized>(graph: &mut Graph, region: &R) -> Result<(), GraphError> {
    let info = EdgeInfo::region(region.name());
    attach(graph, region.coordinates(), &info)?;
    tracing::debug!(
        "attached region {:?} ({} coordinates), graph now has {} vertices",
        region.name(),
        region.coordinates().len(),
        graph.vertex_count()
    );
    Ok(())
}
