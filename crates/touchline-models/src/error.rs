//! Error types for attribution models.

use thiserror::Error;

/// Errors raised while configuring paths or models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Position weights that cannot be normalized
    #[error("Invalid position weights: {0}")]
    InvalidWeights(String),
}
