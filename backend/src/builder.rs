use std::sync::Arc;

use crate::{
    distance::haversine_km,
    graph::{Graph, GraphError},
    merge::merge_coincident_vertices,
    models::{EdgeInfo, Field, Record},
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("record {record} has no polyline at field {index}")]
    MissingGeometry { record: usize, index: usize },
    #[error("merge tolerance must be finite and non-negative, got {0} km")]
    InvalidTolerance(f64),
    #[error("spatial index error: {0:?}")]
    SpatialIndex(kdtree::ErrorKind),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuilderConfig {
    /// Run the coincident-vertex merge pass with this tolerance before building.
    pub merge_tolerance_km: Option<f64>,
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    config: GraphBuilderConfig,
}

impl GraphBuilder {
    pub fn new(config: GraphBuilderConfig) -> Self {
        Self { config }
    }

    /// Build a graph whose edges mirror the consecutive point pairs of every
    /// record's polyline.
    ///
    /// Distinct polylines only connect where they share a bit-identical
    /// coordinate, unless a merge tolerance is configured.
    pub fn build_graph(
        &self,
        records: &[Record],
        geometry_index: usize,
    ) -> Result<Graph, BuildError> {
        let Some(tolerance_km) = self.config.merge_tolerance_km else {
            return build_graph(records, geometry_index);
        };

        let mut merged = records.to_vec();
        let stats = merge_coincident_vertices(&mut merged, geometry_index, tolerance_km)?;
        tracing::info!(
            "merge pass ({} km): {} coordinates folded into {} clusters",
            tolerance_km,
            stats.merged_coordinates,
            stats.clusters
        );
        build_graph(&merged, geometry_index)
    }
}

pub fn build_graph(records: &[Record], geometry_index: usize) -> Result<Graph, BuildError> {
    let mut graph = Graph::new();

    for (record_idx, record) in records.iter().enumerate() {
        let polyline = record
            .polyline(geometry_index)
            .ok_or(BuildError::MissingGeometry {
                record: record_idx,
                index: geometry_index,
            })?;
        let info = EdgeInfo::Segment(attributes(record, geometry_index));

        for pair in polyline.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            graph.add_vertex(from);
            graph.add_vertex(to);
            graph.add_edge(from, to, info.clone(), info.clone(), haversine_km(from, to))?;
        }
    }

    tracing::info!(
        "graph built from {} records: vertices={} edges={} components={}",
        records.len(),
        graph.vertex_count(),
        graph.edge_count(),
        graph.component_count()
    );

    Ok(graph)
}

fn attributes(record: &Record, geometry_index: usize) -> Arc<[Field]> {
    record
        .fields
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != geometry_index)
        .map(|(_, field)| field.clone())
        .collect()
}
