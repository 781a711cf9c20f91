//! Shapley value attribution
//!
//! Channels are players in a coalition game whose value `v(S)` is the
//! fraction of all journeys that converted and touched at least one channel
//! of `S`. A channel's Shapley value is its marginal contribution to `v`
//! averaged over every order in which the channels could join.
//!
//! Exact computation enumerates all `2^n` coalitions and is capped at a
//! configurable number of channels. Above the cap, permutations are sampled.

pub mod coalition;
pub mod exact;
pub mod sampled;

pub use coalition::{Coalition, CoalitionGame, Subsets};
pub use exact::exact_shapley;
pub use sampled::sampled_shapley;

use crate::credits::{ChannelCredits, normalize_scores};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use touchline_data::ChannelGrouping;
use touchline_models::ConversionPath;
use tracing::{debug, warn};

/// Hard limit for exact enumeration; `2^20` coalitions.
pub const MAX_EXACT_CHANNELS: usize = 20;

/// Errors that can occur while configuring the Shapley model
#[derive(Debug, Error)]
pub enum ShapleyError {
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Too many channels for exact enumeration
    #[error("Too many channels for exact Shapley: {count} (maximum {max})")]
    TooManyChannels {
        /// Requested channel count
        count: usize,
        /// Supported maximum
        max: usize,
    },
}

/// Solver selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapleyMode {
    /// Enumerate every coalition, keeping only the most frequent channels above the cutoff
    Exact,
    /// Average marginal contributions over sampled permutations
    Sampled,
    /// Exact up to the cutoff, sampled above it
    #[default]
    Auto,
}

/// Shapley model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapleyConfig {
    /// Channel cutoff for exact enumeration (default: 10)
    pub max_exact_channels: usize,
    /// Permutations drawn in sampled mode (default: 1,000)
    pub samples: usize,
    /// Solver selection (default: auto)
    pub mode: ShapleyMode,
    /// How touchpoints collapse into players (default: by source)
    pub grouping: ChannelGrouping,
    /// Seed for permutation sampling; entropy when unset
    pub seed: Option<u64>,
}

impl Default for ShapleyConfig {
    fn default() -> Self {
        Self {
            max_exact_channels: 10,
            samples: 1_000,
            mode: ShapleyMode::Auto,
            grouping: ChannelGrouping::Source,
            seed: None,
        }
    }
}

impl ShapleyConfig {
    /// Check the cutoff and sample count.
    pub fn validate(&self) -> Result<(), ShapleyError> {
        if self.max_exact_channels == 0 {
            return Err(ShapleyError::InvalidParameter(
                "max_exact_channels must be at least 1".to_string(),
            ));
        }
        if self.max_exact_channels > MAX_EXACT_CHANNELS {
            return Err(ShapleyError::TooManyChannels {
                count: self.max_exact_channels,
                max: MAX_EXACT_CHANNELS,
            });
        }
        if self.samples == 0 {
            return Err(ShapleyError::InvalidParameter(
                "samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shapley value and credit for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyAttributionResult {
    /// Channel (player) label
    pub channel: String,
    /// Shapley value in conversion-rate points, clamped at zero
    pub shapley_value: f64,
    /// Normalized share of all clamped Shapley values
    pub attributed_credit: f64,
}

/// Output of a Shapley run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyAnalysis {
    /// Solver that produced the values
    pub mode_used: ShapleyMode,
    /// Value of the grand coalition (overall conversion rate of touched journeys)
    pub total_value: f64,
    /// Channels seen in the data but left out of exact enumeration
    pub excluded_channels: Vec<String>,
    /// Per-channel results in channel order
    pub results: Vec<ShapleyAttributionResult>,
}

impl ShapleyAnalysis {
    /// Normalized credit per channel.
    pub fn channel_credits(&self) -> ChannelCredits {
        self.results
            .iter()
            .map(|r| (r.channel.clone(), r.attributed_credit))
            .collect()
    }
}

/// Shapley value attribution model
#[derive(Debug, Clone, Default)]
pub struct ShapleyModel {
    config: ShapleyConfig,
}

impl ShapleyModel {
    /// Create a model with a validated configuration.
    pub fn new(config: ShapleyConfig) -> Result<Self, ShapleyError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a model with default settings.
    pub fn try_default() -> Result<Self, ShapleyError> {
        Self::new(ShapleyConfig::default())
    }

    /// Active configuration.
    pub const fn config(&self) -> &ShapleyConfig {
        &self.config
    }

    /// Analyze paths with an RNG seeded from the configuration.
    pub fn analyze(
        &self,
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
    ) -> ShapleyAnalysis {
        let mut rng = self
            .config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        self.analyze_with_rng(conversions, non_conversions, &mut rng)
    }

    /// Analyze paths with a caller-supplied RNG for sampled mode.
    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
        rng: &mut R,
    ) -> ShapleyAnalysis {
        let grouping = self.config.grouping;
        let cutoff = self.config.max_exact_channels;

        // Touchpoint counts per channel decide which channels survive the cutoff
        let mut frequency: BTreeMap<String, usize> = BTreeMap::new();
        for path in conversions.iter().chain(non_conversions) {
            for label in path.labels(grouping) {
                *frequency.entry(label).or_default() += 1;
            }
        }

        let mode_used = match self.config.mode {
            ShapleyMode::Auto if frequency.len() <= cutoff => ShapleyMode::Exact,
            ShapleyMode::Auto => ShapleyMode::Sampled,
            mode => mode,
        };

        let mut channels: Vec<String> = frequency.keys().cloned().collect();
        let mut excluded_channels = Vec::new();
        if mode_used == ShapleyMode::Exact && channels.len() > cutoff {
            let mut ranked: Vec<(&String, &usize)> = frequency.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let (kept, dropped) = ranked.split_at(cutoff);

            channels = kept.iter().map(|(c, _)| (*c).clone()).collect();
            channels.sort();
            excluded_channels = dropped.iter().map(|(c, _)| (*c).clone()).collect();
            excluded_channels.sort();

            warn!(
                channels = frequency.len(),
                cutoff,
                excluded = excluded_channels.len(),
                "Too many channels for exact Shapley; keeping the most frequent"
            );
        }

        let game = CoalitionGame::from_paths(conversions, non_conversions, channels, grouping);
        let values = match mode_used {
            ShapleyMode::Sampled => sampled_shapley(&game, self.config.samples, rng),
            _ => exact_shapley(&game),
        };

        let credits = normalize_scores(
            game.channels()
                .iter()
                .cloned()
                .zip(values.iter().copied()),
        );

        let results = game
            .channels()
            .iter()
            .zip(values)
            .map(|(channel, shapley_value)| ShapleyAttributionResult {
                channel: channel.clone(),
                shapley_value: shapley_value.max(0.0),
                attributed_credit: credits.get(channel).copied().unwrap_or(0.0),
            })
            .collect();

        let total_value = game.grand_value();
        debug!(
            players = game.len(),
            mode = ?mode_used,
            total_value,
            "Computed Shapley values"
        );

        ShapleyAnalysis {
            mode_used,
            total_value,
            excluded_channels,
            results,
        }
    }
}
