//! Export of attribution results to CSV and JSON.
//!
//! Results are flattened into row types first so that every format sees the
//! same columns. CSV headers come from the row field names.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use touchline_algorithmic::{LiftAttributionResult, MarkovAnalysis, ShapleyAnalysis, StageAnalysis};
use chrono::{DateTime, Utc};
use touchline_models::{AggregatedAttribution, AttributionResult};

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output was not valid UTF-8.
    #[error("Encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    #[default]
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension; JSON files are pretty-printed.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::PrettyJson),
            _ => None,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One channel of a model's per-channel rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRow {
    /// Model that produced the credits.
    pub model: String,
    /// `source|medium|campaign` key.
    pub channel_key: String,
    /// Traffic source.
    pub source: String,
    /// Traffic medium.
    pub medium: String,
    /// Campaign.
    pub campaign: String,
    /// Touchpoints on the channel.
    pub touchpoints: usize,
    /// Converting paths the channel appeared in.
    pub conversions_in_path: usize,
    /// Fractional conversions credited.
    pub attributed_conversions: f64,
    /// Value credited.
    pub attributed_revenue: f64,
    /// Mean 1-indexed position in its paths.
    pub average_position: f64,
}

impl ChannelRow {
    /// Flatten one aggregated channel.
    pub fn new(model: &str, aggregated: &AggregatedAttribution) -> Self {
        Self {
            model: model.to_string(),
            channel_key: aggregated.channel_key.clone(),
            source: aggregated.channel.source.clone(),
            medium: aggregated.channel.medium.clone(),
            campaign: aggregated.channel.campaign.clone(),
            touchpoints: aggregated.touchpoints,
            conversions_in_path: aggregated.conversions_in_path,
            attributed_conversions: aggregated.attributed_conversions,
            attributed_revenue: aggregated.attributed_revenue,
            average_position: aggregated.average_position,
        }
    }

    /// Flatten a whole rollup.
    pub fn from_aggregated(model: &str, aggregated: &[AggregatedAttribution]) -> Vec<Self> {
        aggregated.iter().map(|a| Self::new(model, a)).collect()
    }
}

/// One channel's global credit from a population-level model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditRow {
    /// Model that produced the credit.
    pub model: String,
    /// Channel label.
    pub channel: String,
    /// Raw model score (removal effect, Shapley value or lift).
    pub score: f64,
    /// Normalized credit; all channels of a model sum to 1.
    pub attributed_credit: f64,
}

impl CreditRow {
    /// Rows from Markov removal effects.
    pub fn from_markov(analysis: &MarkovAnalysis) -> Vec<Self> {
        analysis
            .results
            .iter()
            .map(|r| Self {
                model: "markov".to_string(),
                channel: r.channel.clone(),
                score: r.removal_effect,
                attributed_credit: r.attributed_credit,
            })
            .collect()
    }

    /// Rows from Shapley values.
    pub fn from_shapley(analysis: &ShapleyAnalysis) -> Vec<Self> {
        analysis
            .results
            .iter()
            .map(|r| Self {
                model: "shapley".to_string(),
                channel: r.channel.clone(),
                score: r.shapley_value,
                attributed_credit: r.attributed_credit,
            })
            .collect()
    }

    /// Rows from presence lift.
    pub fn from_lift(results: &[LiftAttributionResult]) -> Vec<Self> {
        results
            .iter()
            .map(|r| Self {
                model: "data_driven".to_string(),
                channel: r.channel.clone(),
                score: r.lift,
                attributed_credit: r.attributed_credit,
            })
            .collect()
    }
}

/// One funnel stage of a stage analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRow {
    /// Organization.
    pub org_id: String,
    /// Stage identifier.
    pub stage_id: String,
    /// Stage display name.
    pub name: String,
    /// Funnel position.
    pub ordinal: i32,
    /// Removal effect in [0, 1].
    pub removal_effect: f64,
    /// Normalized credit.
    pub attributed_credit: f64,
    /// Whether the stage is critical.
    pub is_critical: bool,
    /// Confidence tier of the whole analysis.
    pub quality: String,
}

impl StageRow {
    /// Flatten a stage analysis.
    pub fn from_analysis(analysis: &StageAnalysis) -> Vec<Self> {
        analysis
            .stages
            .iter()
            .map(|s| Self {
                org_id: analysis.org_id.clone(),
                stage_id: s.stage_id.clone(),
                name: s.name.clone(),
                ordinal: s.ordinal,
                removal_effect: s.removal_effect,
                attributed_credit: s.attributed_credit,
                is_critical: s.is_critical,
                quality: analysis.quality.to_string(),
            })
            .collect()
    }
}

/// One credited touchpoint of one path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TouchpointRow {
    /// Model name.
    pub model: String,
    /// Conversion the touchpoint led to.
    pub path_id: String,
    /// 1-based position in the path.
    pub position: usize,
    /// Source event id.
    pub event_id: String,
    /// Exposure time.
    pub timestamp: DateTime<Utc>,
    /// `source|medium|campaign` key.
    pub channel_key: String,
    /// Credit in conversion value units.
    pub credit: f64,
    /// Credit as a percentage of the conversion.
    pub credit_percentage: f64,
}

impl TouchpointRow {
    /// Flatten attribution results, one row per credited touchpoint.
    pub fn from_results(results: &[AttributionResult]) -> Vec<Self> {
        results
            .iter()
            .flat_map(|result| {
                result.touchpoints.iter().enumerate().map(|(i, t)| Self {
                    model: result.model.clone(),
                    path_id: result.path_id.clone(),
                    position: i + 1,
                    event_id: t.touchpoint.event_id.clone(),
                    timestamp: t.touchpoint.timestamp,
                    channel_key: t.touchpoint.channel.key(),
                    credit: t.credit,
                    credit_percentage: t.credit_percentage,
                })
            })
            .collect()
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Serialize records as CSV with a header row taken from the first record.
pub(crate) fn csv_string<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn export_records<T: Serialize>(records: &[T], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => csv_string(records),
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

impl Exporter for Vec<ChannelRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for Vec<CreditRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for Vec<TouchpointRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}

impl Exporter for Vec<StageRow> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_records(self, format)
    }
}
