//! Error types for the attribution engine.

use thiserror::Error;
use touchline_algorithmic::{MarkovError, ShapleyError, StageError};
use touchline_data::DataError;
use touchline_models::ModelError;

/// Errors that can occur while configuring or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Model name not recognized
    #[error("Unknown attribution model: {0}")]
    UnknownModel(String),

    /// Invalid direct-model or path-builder configuration
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Invalid Markov configuration
    #[error("Markov error: {0}")]
    Markov(#[from] MarkovError),

    /// Invalid Shapley configuration
    #[error("Shapley error: {0}")]
    Shapley(#[from] ShapleyError),

    /// Stage analysis failure
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Data layer failure
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
