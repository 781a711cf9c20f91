//! Engine configuration
//!
//! Every section is optional in TOML; missing keys take their defaults.
//!
//! ```toml
//! model = "position_based"
//! grouping = "source_medium"
//!
//! [path_builder]
//! attribution_window_days = 14
//!
//! [position_weights]
//! first = 0.3
//! last = 0.5
//! middle = 0.2
//!
//! [shapley]
//! mode = "sampled"
//! samples = 2000
//! seed = 7
//! ```

use crate::engine::{AttributionModel, ModelConfig};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use touchline_algorithmic::{MarkovConfig, ShapleyConfig, StageServiceConfig};
use touchline_data::ChannelGrouping;
use touchline_models::{PathBuilderConfig, PositionWeights, TimeDecayConfig};

/// Configuration for [`AttributionEngine`](crate::AttributionEngine)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model used when none is given explicitly
    pub model: AttributionModel,
    /// Path builder settings
    pub path_builder: PathBuilderConfig,
    /// Time-decay half-life
    pub time_decay: TimeDecayConfig,
    /// Position-based weights
    pub position_weights: PositionWeights,
    /// How touchpoints map to credited channels
    pub grouping: ChannelGrouping,
    /// Markov removal-effect settings
    pub markov: MarkovConfig,
    /// Shapley settings
    pub shapley: ShapleyConfig,
    /// Stage service settings
    pub stage: StageServiceConfig,
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.path_builder.validate()?;
        self.time_decay.validate()?;
        self.position_weights.validate()?;
        self.markov.validate()?;
        self.shapley.validate()?;
        self.stage.validate()?;
        Ok(())
    }

    /// Per-path settings for `model`, without precomputed credits.
    pub fn model_config(&self, model: AttributionModel) -> ModelConfig {
        ModelConfig {
            model,
            attribution_window_days: self.path_builder.attribution_window_days,
            time_decay_half_life_days: self.time_decay.half_life_days,
            position_based_weights: Some(self.position_weights),
            markov_credits: None,
            shapley_credits: None,
            data_driven_credits: None,
            grouping: self.grouping,
        }
    }
}
