//! Report envelope for attribution runs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required field was not set on the builder.
    #[error("Missing report field: {0}")]
    MissingField(&'static str),
}

/// A report from one attribution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report title.
    pub title: String,

    /// Model or analysis that produced the contents.
    pub model: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// First day covered by the input, if known.
    pub period_start: Option<NaiveDate>,

    /// Last day covered by the input, if known.
    pub period_end: Option<NaiveDate>,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report.
    pub fn new(title: String, model: String, contents: serde_json::Value) -> Self {
        Self {
            title,
            model,
            timestamp: Utc::now(),
            period_start: None,
            period_end: None,
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    title: Option<String>,
    model: Option<String>,
    period: Option<(NaiveDate, NaiveDate)>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the covered period.
    pub const fn period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period = Some((start, end));
        self
    }

    /// Set the report contents.
    pub fn contents(mut self, contents: serde_json::Value) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Serialize any value as the report contents.
    pub fn contents_from<T: Serialize>(mut self, value: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Build the report; a model name is required.
    pub fn build(self) -> Result<Report, ReportError> {
        let model = self.model.ok_or(ReportError::MissingField("model"))?;
        let title = self
            .title
            .unwrap_or_else(|| format!("Touchline attribution: {model}"));
        let mut report = Report::new(
            title,
            model,
            self.contents.unwrap_or(serde_json::Value::Null),
        );
        if let Some((start, end)) = self.period {
            report.period_start = Some(start);
            report.period_end = Some(end);
        }
        Ok(report)
    }
}
