use std::path::PathBuf;

use crate::models::Coordinate;

pub const DEFAULT_BIKEWAYS_CSV: &str = "backend/data/sample_bikeways.csv";
pub const DEFAULT_PARKS_CSV: &str = "backend/data/sample_parks.csv";
pub const DEFAULT_GEOMETRY_COLUMN: &str = "Geom";
pub const DEFAULT_PARK_NAME_COLUMN: &str = "PARK_NAME";

/// Start point used when a route request names none (NEU Vancouver campus).
pub const DEFAULT_START: Coordinate = Coordinate::new(49.280747, -123.115540);
pub const DEFAULT_START_NAME: &str = "NEU";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the input datasets live and how to read them.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub bikeways_csv: PathBuf,
    pub parks_csv: PathBuf,
    pub geometry_column: String,
    pub park_name_column: String,
    /// Tolerance of the coincident-vertex merge pass, disabled when `None`.
    pub merge_tolerance_km: Option<f64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            bikeways_csv: PathBuf::from(DEFAULT_BIKEWAYS_CSV),
            parks_csv: PathBuf::from(DEFAULT_PARKS_CSV),
            geometry_column: DEFAULT_GEOMETRY_COLUMN.to_string(),
            park_name_column: DEFAULT_PARK_NAME_COLUMN.to_string(),
            merge_tolerance_km: None,
        }
    }
}

impl DatasetConfig {
    /// Read `BIKEWAYS_CSV`, `PARKS_CSV`, `GEOMETRY_COLUMN`, `PARK_NAME_COLUMN`
    /// and `MERGE_TOLERANCE_M` (meters), falling back to the sample data.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let merge_tolerance_km = match non_empty("MERGE_TOLERANCE_M") {
            Some(raw) => Some(parse_tolerance_m("MERGE_TOLERANCE_M", &raw)? / 1000.0),
            None => None,
        };

        Ok(Self {
            bikeways_csv: non_empty("BIKEWAYS_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.bikeways_csv),
            parks_csv: non_empty("PARKS_CSV")
                .map(PathBuf::from)
                .unwrap_or(defaults.parks_csv),
            geometry_column: non_empty("GEOMETRY_COLUMN").unwrap_or(defaults.geometry_column),
            park_name_column: non_empty("PARK_NAME_COLUMN").unwrap_or(defaults.park_name_column),
            merge_tolerance_km,
        })
    }
}

fn parse_tolerance_m(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let meters: f64 = raw.trim().parse().map_err(|_| invalid("not a number"))?;
    if !meters.is_finite() || meters < 0.0 {
        return Err(invalid("must be finite and non-negative"));
    }
    Ok(meters)
}
