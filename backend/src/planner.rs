use std::{fs::File, io::BufReader, sync::Mutex};

use serde::Serialize;

use crate::{
    builder::{GraphBuilder, GraphBuilderConfig},
    config::DatasetConfig,
    dataset::{load_bikeways, load_parks},
    engine::{HeapDijkstra, PathFinder, ShortestPathEngine},
    error::RouteError,
    graph::Graph,
    models::{
        Coordinate, Park, Region, RouteBounds, RouteMetadata, RouteRequest, RouteResponse,
        StartPoint,
    },
};

/// Catalogue entry listed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkSummary {
    pub name: String,
    pub center: Option<Coordinate>,
    pub boundary_points: usize,
}

/// Answers route requests against a bikeway graph and a park catalogue.
///
/// Every request snaps its start and park into the shared graph, so all
/// access goes through one lock.
pub struct RoutePlanner<F = HeapDijkstra> {
    graph: Mutex<Graph>,
    parks: Vec<Park>,
    engine: ShortestPathEngine<F>,
}

impl RoutePlanner<HeapDijkstra> {
    pub fn new(graph: Graph, parks: Vec<Park>) -> Self {
        Self::with_engine(graph, parks, ShortestPathEngine::new())
    }

    pub fn from_config(config: &DatasetConfig) -> Result<Self, RouteError> {
        let bikeways = load_bikeways(
            BufReader::new(File::open(&config.bikeways_csv)?),
            &config.geometry_column,
        )?;
        let parks = load_parks(
            BufReader::new(File::open(&config.parks_csv)?),
            &config.geometry_column,
            &config.park_name_column,
        )?;

        let builder = GraphBuilder::new(GraphBuilderConfig {
            merge_tolerance_km: config.merge_tolerance_km,
        });
        let graph = builder.build_graph(&bikeways.records, bikeways.geometry_index)?;
        tracing::info!(
            "route planner ready: {} vertices, {} edges, {} parks",
            graph.vertex_count(),
            graph.edge_count(),
            parks.len()
        );

        Ok(Self::new(graph, parks))
    }
}

impl<F: PathFinder> RoutePlanner<F> {
    pub fn with_engine(graph: Graph, parks: Vec<Park>, engine: ShortestPathEngine<F>) -> Self {
        Self {
            graph: Mutex::new(graph),
            parks,
            engine,
        }
    }

    pub fn parks(&self) -> &[Park] {
        &self.parks
    }

    pub fn park_summaries(&self) -> Vec<ParkSummary> {
        self.parks
            .iter()
            .map(|park| ParkSummary {
                name: park.name().to_string(),
                center: park.center(),
                boundary_points: park.coordinates().len(),
            })
            .collect()
    }

    /// First park with this exact name.
    pub fn park(&self, name: &str) -> Option<&Park> {
        self.parks.iter().find(|park| park.name() == name)
    }

    pub fn vertex_count(&self) -> Result<usize, RouteError> {
        let graph = self.graph.lock().map_err(|_| RouteError::GraphLockPoisoned)?;
        Ok(graph.vertex_count())
    }

    pub fn plan(&self, request: &RouteRequest) -> Result<RouteResponse, RouteError> {
        let park = self
            .park(&request.park)
            .ok_or_else(|| RouteError::UnknownPark(request.park.clone()))?;
        let start = StartPoint::at(request.start_name.as_str(), request.start);

        let route = {
            let mut graph = self.graph.lock().map_err(|_| RouteError::GraphLockPoisoned)?;
            self.engine.find_shortest_path(&mut graph, &start, park)?
        };

        let metadata = RouteBounds::from_path(&route.path).map(|bounds| RouteMetadata {
            point_count: route.path.len(),
            bounds,
            start: route.source(),
            end: route.destination(),
        });

        tracing::info!(
            "planned {:?} -> {:?}: {:.3} km over {} points",
            start.name(),
            park.name(),
            route.distance_km,
            route.path.len()
        );

        Ok(RouteResponse {
            park: park.name().to_string(),
            path: route.path,
            distance_km: route.distance_km,
            metadata,
        })
    }
}
