//! Markov removal-effect attribution
//!
//! Journeys are read as walks through a graph whose nodes are channels plus
//! three special states: `start`, `conversion` and `null` (no conversion).
//! The probability of reaching `conversion` from `start` is the baseline. A
//! channel's removal effect is the relative drop in that probability when the
//! channel is removed and every walk through it is sent to `null`.

pub mod matrix;
pub mod removal;
pub mod simulation;

pub use matrix::{CONVERSION_STATE, NULL_STATE, START_STATE, TransitionMatrix};
pub use removal::{MarkovAnalysis, MarkovAttributionResult, MarkovModel, removal_effect};
pub use simulation::{AbsorptionMethod, analytic_conversion_rate, simulate_conversion_rate};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use touchline_data::ChannelGrouping;

/// Errors that can occur while building or solving a transition graph
#[derive(Debug, Error)]
pub enum MarkovError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Matrix shape does not match the state list
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A state name that is not part of the graph
    #[error("Unknown state: {0}")]
    UnknownState(String),
}

/// Markov model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    /// Random walks per absorption estimate (default: 10,000)
    pub walks: usize,
    /// Step cap for a single walk or value-iteration sweeps (default: 1,000)
    pub max_steps: usize,
    /// How the absorption probability is computed (default: Monte-Carlo)
    pub method: AbsorptionMethod,
    /// How touchpoints collapse into nodes (default: by source)
    pub grouping: ChannelGrouping,
    /// Seed for the random walks; entropy when unset
    pub seed: Option<u64>,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            walks: 10_000,
            max_steps: 1_000,
            method: AbsorptionMethod::MonteCarlo,
            grouping: ChannelGrouping::Source,
            seed: None,
        }
    }
}

impl MarkovConfig {
    /// Check walk and step counts.
    pub fn validate(&self) -> Result<(), MarkovError> {
        if self.walks == 0 {
            return Err(MarkovError::InvalidParameter(
                "walks must be at least 1".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(MarkovError::InvalidParameter(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
