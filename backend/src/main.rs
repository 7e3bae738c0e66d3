use std::{fs::File, io::BufWriter, path::PathBuf};

use clap::Parser;
use parkroute::{
    config::{DatasetConfig, DEFAULT_START, DEFAULT_START_NAME},
    gpx_export::write_route_gpx,
    models::{Coordinate, RouteRequest},
    planner::RoutePlanner,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find the shortest bikeway route from a starting point to a park"
)]
struct Args {
    /// Bikeways CSV (overrides BIKEWAYS_CSV)
    #[arg(long)]
    bikeways: Option<PathBuf>,

    /// Parks CSV (overrides PARKS_CSV)
    #[arg(long)]
    parks: Option<PathBuf>,

    /// Name of the GeoJSON geometry column in both files
    #[arg(long)]
    geometry_column: Option<String>,

    #[arg(long)]
    park_name_column: Option<String>,

    /// Join polyline points closer than this many meters before building the graph
    #[arg(long)]
    merge_tolerance_m: Option<f64>,

    #[arg(long, allow_hyphen_values = true, default_value_t = DEFAULT_START.lat)]
    start_lat: f64,

    #[arg(long, allow_hyphen_values = true, default_value_t = DEFAULT_START.lon)]
    start_lon: f64,

    #[arg(long, default_value = DEFAULT_START_NAME)]
    start_name: String,

    /// Destination park name
    #[arg(long, required_unless_present = "list_parks")]
    park: Option<String>,

    /// Print the park catalogue as JSON and exit
    #[arg(long)]
    list_parks: bool,

    /// Also write the route as GPX to this file
    #[arg(long)]
    gpx: Option<PathBuf>,
}

impl Args {
    fn route_request(&self) -> Option<RouteRequest> {
        Some(RouteRequest {
            start: Coordinate::new(self.start_lat, self.start_lon),
            start_name: self.start_name.clone(),
            park: self.park.clone()?,
        })
    }

    fn dataset_config(&self) -> Result<DatasetConfig, Box<dyn std::error::Error>> {
        let mut config = DatasetConfig::from_env()?;
        if let Some(path) = &self.bikeways {
            config.bikeways_csv = path.clone();
        }
        if let Some(path) = &self.parks {
            config.parks_csv = path.clone();
        }
        if let Some(column) = &self.geometry_column {
            config.geometry_column = column.clone();
        }
        if let Some(column) = &self.park_name_column {
            config.park_name_column = column.clone();
        }
        if let Some(meters) = self.merge_tolerance_m {
            if !meters.is_finite() || meters < 0.0 {
                let message = format!("--merge-tolerance-m must be non-negative, got {meters}");
                return Err(message.into());
            }
            config.merge_tolerance_km = Some(meters / 1000.0);
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parkroute=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.dataset_config()?;
    tracing::info!(
        "loading bikeways from {:?} and parks from {:?}",
        config.bikeways_csv,
        config.parks_csv
    );
    let planner = RoutePlanner::from_config(&config)?;

    if args.list_parks {
        println!("{}", serde_json::to_string_pretty(&planner.park_summaries())?);
        return Ok(());
    }

    let Some(request) = args.route_request() else {
        return Err("--park is required".into());
    };

    let response = planner.plan(&request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(path) = &args.gpx {
        let writer = BufWriter::new(File::create(path)?);
        write_route_gpx(&response.path, &response.park, writer)?;
        tracing::info!("route written to {:?}", path);
    }

    Ok(())
}
