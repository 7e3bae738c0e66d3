use thiserror::Error;

use crate::builder::BuildError;
use crate::config::ConfigError;
use crate::dataset::DatasetError;
use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("routing engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to build bikeway graph: {0}")]
    Build(#[from] BuildError),
    #[error("failed to load dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown park {0:?}")]
    UnknownPark(String),
    #[error("graph lock poisoned by a panicked request")]
    GraphLockPoisoned,
}
