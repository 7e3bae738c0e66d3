use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use parkroute::{
    builder::build_graph, config::DatasetConfig, dataset::load_bikeways, graph::Graph,
    merge::merge_coincident_vertices,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Report vertex, edge and component counts of the bikeway graph"
)]
struct Args {
    /// Bikeways CSV (defaults to BIKEWAYS_CSV or the bundled sample)
    #[arg(long)]
    bikeways: Option<PathBuf>,

    #[arg(long)]
    geometry_column: Option<String>,

    /// Also report the graph after merging points closer than this many meters
    #[arg(long)]
    merge_tolerance_m: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = DatasetConfig::from_env()?;
    let path = args.bikeways.unwrap_or(config.bikeways_csv);
    let geometry_column = args.geometry_column.unwrap_or(config.geometry_column);
    let tolerance_km = args
        .merge_tolerance_m
        .map(|meters| meters / 1000.0)
        .or(config.merge_tolerance_km);

    tracing::info!("reading bikeways from {:?}", path);
    let mut table = load_bikeways(BufReader::new(File::open(&path)?), &geometry_column)?;

    let graph = build_graph(&table.records, table.geometry_index)?;
    report("exact", &graph);

    if let Some(tolerance_km) = tolerance_km {
        let stats =
            merge_coincident_vertices(&mut table.records, table.geometry_index, tolerance_km)?;
        tracing::info!(
            "merged {} coordinates into {} clusters",
            stats.merged_coordinates,
            stats.clusters
        );
        let merged = build_graph(&table.records, table.geometry_index)?;
        report("merged", &merged);
    }

    Ok(())
}

fn report(label: &str, graph: &Graph) {
    tracing::info!(
        "{label}: vertices={} edges={} components={}",
        graph.vertex_count(),
        graph.edge_count(),
        graph.component_count()
    );
}
