pub mod builder;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod engine;
pub mod error;
pub mod gpx_export;
pub mod graph;
pub mod merge;
pub mod models;
pub mod planner;
pub mod snap;

pub use builder::{GraphBuilder, GraphBuilderConfig, build_graph};
pub use engine::{ShortestPathEngine, find_shortest_path, query_shortest_path};
pub use error::RouteError;
pub use graph::Graph;
pub use planner::RoutePlanner;
