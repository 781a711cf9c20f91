//! Side-by-side comparison of direct models.
//!
//! Each model distributes the same conversion value, so channel revenue is
//! compared as a share of each model's total.

use crate::export::{ExportError, ExportFormat, Exporter, csv_string};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use touchline_models::AggregatedAttribution;

/// One channel across all compared models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonRow {
    /// `source|medium|campaign` key.
    pub channel_key: String,
    /// Credited value per model, in model order.
    pub revenue: Vec<f64>,
    /// Percentage of each model's total value, in model order.
    pub share_pct: Vec<f64>,
}

impl ComparisonRow {
    /// Mean share across models.
    pub fn mean_share(&self) -> f64 {
        if self.share_pct.is_empty() {
            return 0.0;
        }
        self.share_pct.iter().sum::<f64>() / self.share_pct.len() as f64
    }

    /// Largest minus smallest share; how much the models disagree.
    pub fn spread(&self) -> f64 {
        let max = self.share_pct.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.share_pct.iter().copied().fold(f64::INFINITY, f64::min);
        if max.is_finite() && min.is_finite() { max - min } else { 0.0 }
    }
}

#[derive(Debug, Serialize)]
struct ComparisonRecord<'a> {
    model: &'a str,
    channel_key: &'a str,
    revenue: f64,
    share_pct: f64,
}

/// Revenue share per channel for several models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelComparison {
    /// Model names, in input order.
    pub models: Vec<String>,
    /// Channels by mean share, highest first.
    pub rows: Vec<ComparisonRow>,
}

impl ModelComparison {
    /// The channel the models disagree on most.
    pub fn most_contested(&self) -> Option<&ComparisonRow> {
        self.rows
            .iter()
            .max_by(|a, b| a.spread().total_cmp(&b.spread()))
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let width = 36 + self.models.len() * 15;
        let mut output = String::new();

        output.push_str("\nModel Comparison (% of attributed value)\n");
        output.push_str(&"=".repeat(width));
        output.push('\n');
        output.push_str(&format!("{:<36}", "Channel"));
        for model in &self.models {
            output.push_str(&format!("{model:>15}"));
        }
        output.push('\n');
        output.push_str(&"-".repeat(width));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("{:<36}", row.channel_key));
            for share in &row.share_pct {
                output.push_str(&format!("{:>14.2}%", share));
            }
            output.push('\n');
        }
        output.push_str(&"=".repeat(width));
        output.push('\n');
        if let Some(row) = self.most_contested() {
            output.push_str(&format!(
                "Most contested: {} (spread {:.2} pts)\n",
                row.channel_key,
                row.spread()
            ));
        }

        output
    }

    /// Format as Markdown table for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Model Comparison\n\n");
        output.push_str("| Channel |");
        for model in &self.models {
            output.push_str(&format!(" {model} |"));
        }
        output.push_str("\n|---------|");
        output.push_str(&"------|".repeat(self.models.len()));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!("| {} |", row.channel_key));
            for share in &row.share_pct {
                output.push_str(&format!(" {share:.2}% |"));
            }
            output.push('\n');
        }

        output
    }
}

impl fmt::Display for ModelComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii_table())
    }
}

impl Exporter for ModelComparison {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut records = Vec::new();
                for row in &self.rows {
                    for (i, model) in self.models.iter().enumerate() {
                        records.push(ComparisonRecord {
                            model,
                            channel_key: &row.channel_key,
                            revenue: row.revenue.get(i).copied().unwrap_or(0.0),
                            share_pct: row.share_pct.get(i).copied().unwrap_or(0.0),
                        });
                    }
                }
                csv_string(&records)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Compare per-channel rollups of several models.
///
/// A channel missing from a model's rollup counts as zero for that model.
pub fn compare_models(results: &[(String, Vec<AggregatedAttribution>)]) -> ModelComparison {
    let models: Vec<String> = results.iter().map(|(name, _)| name.clone()).collect();
    let n = models.len();

    let mut revenue: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (i, (_, aggregated)) in results.iter().enumerate() {
        for channel in aggregated {
            let entry = revenue
                .entry(channel.channel_key.clone())
                .or_insert_with(|| vec![0.0; n]);
            entry[i] += channel.attributed_revenue;
        }
    }

    let totals: Vec<f64> = results
        .iter()
        .map(|(_, aggregated)| aggregated.iter().map(|a| a.attributed_revenue).sum())
        .collect();

    let mut rows: Vec<ComparisonRow> = revenue
        .into_iter()
        .map(|(channel_key, revenue)| {
            let share_pct = revenue
                .iter()
                .zip(&totals)
                .map(|(r, t)| if *t > 0.0 { r / t * 100.0 } else { 0.0 })
                .collect();
            ComparisonRow {
                channel_key,
                revenue,
                share_pct,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.mean_share()
            .total_cmp(&a.mean_share())
            .then_with(|| a.channel_key.cmp(&b.channel_key))
    });

    ModelComparison { models, rows }
}
