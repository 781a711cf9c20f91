//! Funnel-stage importance
//!
//! Applies the Markov removal-effect mathematics to an organization's funnel.
//! States are the funnel stages in ordinal order and transition probabilities
//! come from pre-aggregated stage transition rows instead of raw journeys.
//! Periods without any transition data get a position-only estimate flagged
//! as low quality.

pub mod heuristic;
pub mod service;

pub use heuristic::heuristic_analysis;
pub use service::{StageMarkovService, build_stage_matrix, total_visitors};

use crate::markov::{AbsorptionMethod, MarkovConfig, MarkovError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use touchline_data::DataError;

/// Errors that can occur during stage analysis
#[derive(Debug, Error)]
pub enum StageError {
    /// Funnel data could not be read
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Markov model rejected its input
    #[error("Markov error: {0}")]
    Markov(#[from] MarkovError),

    /// Cached analysis could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid service configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Stage service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageServiceConfig {
    /// Removal effect above which a stage is critical (default: 0.3)
    pub critical_threshold: f64,
    /// Lifetime of cached analyses in seconds (default: 300)
    pub cache_ttl_seconds: i64,
    /// Absorption settings; analytic by default so cached results are stable
    pub markov: MarkovConfig,
}

impl Default for StageServiceConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 0.3,
            cache_ttl_seconds: 300,
            markov: MarkovConfig {
                method: AbsorptionMethod::Analytic,
                ..MarkovConfig::default()
            },
        }
    }
}

impl StageServiceConfig {
    /// Check the threshold, the TTL and the Markov settings.
    pub fn validate(&self) -> Result<(), StageError> {
        if !(0.0..=1.0).contains(&self.critical_threshold) {
            return Err(StageError::InvalidConfig(format!(
                "critical_threshold must be in [0, 1], got {}",
                self.critical_threshold
            )));
        }
        if self.cache_ttl_seconds < 0 {
            return Err(StageError::InvalidConfig(
                "cache_ttl_seconds must not be negative".to_string(),
            ));
        }
        self.markov.validate()?;
        Ok(())
    }
}

/// Confidence in a stage analysis, from the amount of observed traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisQuality {
    /// At least 1,000 visitors
    High,
    /// At least 100 visitors
    Medium,
    /// Fewer than 100 visitors, or the heuristic fallback
    Low,
}

impl AnalysisQuality {
    /// Quality tier for a visitor count.
    pub const fn from_visitors(visitors: u64) -> Self {
        if visitors >= 1_000 {
            Self::High
        } else if visitors >= 100 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for AnalysisQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Removal effect and credit for one funnel stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRemovalEffect {
    /// Stage identifier
    pub stage_id: String,
    /// Display name
    pub name: String,
    /// Funnel position
    pub ordinal: i32,
    /// Relative drop in conversion probability without the stage, in [0, 1]
    pub removal_effect: f64,
    /// Normalized share of all removal effects
    pub attributed_credit: f64,
    /// Whether the removal effect exceeds the critical threshold
    pub is_critical: bool,
}

/// Stage importance for one organization and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAnalysis {
    /// Organization
    pub org_id: String,
    /// First day of the period
    pub period_start: NaiveDate,
    /// Last day of the period, inclusive
    pub period_end: NaiveDate,
    /// Per-stage results in ordinal order
    pub stages: Vec<StageRemovalEffect>,
    /// Probability of reaching conversion from the funnel entry
    pub baseline_conversion_probability: f64,
    /// Visitors observed across all stages
    pub total_visitors: u64,
    /// Confidence tier
    pub quality: AnalysisQuality,
    /// Whether the position heuristic replaced the Markov analysis
    pub used_fallback: bool,
    /// When the analysis was computed
    pub computed_at: DateTime<Utc>,
}

impl StageAnalysis {
    /// Stages flagged as critical.
    pub fn critical_stages(&self) -> impl Iterator<Item = &StageRemovalEffect> {
        self.stages.iter().filter(|s| s.is_critical)
    }
}
