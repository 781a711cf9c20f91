//! Terminal and Markdown tables for attribution results.

use crate::export::{ChannelRow, CreditRow, StageRow};
use std::fmt;
use touchline_algorithmic::{LiftAttributionResult, MarkovAnalysis, ShapleyAnalysis, StageAnalysis};
use touchline_models::AggregatedAttribution;

/// Per-channel rollup of one direct model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTable {
    /// Model name.
    pub model: String,
    /// Channels, highest revenue first.
    pub channels: Vec<AggregatedAttribution>,
}

impl ChannelTable {
    /// Create a table for `model`.
    pub fn new(model: impl Into<String>, channels: Vec<AggregatedAttribution>) -> Self {
        Self {
            model: model.into(),
            channels,
        }
    }

    /// Total credited value across channels.
    pub fn total_revenue(&self) -> f64 {
        self.channels.iter().map(|c| c.attributed_revenue).sum()
    }

    /// Flat rows for export.
    pub fn rows(&self) -> Vec<ChannelRow> {
        ChannelRow::from_aggregated(&self.model, &self.channels)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nChannel Attribution: {}\n", self.model));
        output.push_str(&"=".repeat(96));
        output.push('\n');
        output.push_str(&format!(
            "{:<40} {:>8} {:>10} {:>12} {:>12} {:>9}\n",
            "Channel", "Touches", "Paths", "Conversions", "Revenue", "Avg Pos"
        ));
        output.push_str(&"-".repeat(96));
        output.push('\n');

        for channel in &self.channels {
            output.push_str(&format!(
                "{:<40} {:>8} {:>10} {:>12.2} {:>12.2} {:>9.2}\n",
                channel.channel_key,
                channel.touchpoints,
                channel.conversions_in_path,
                channel.attributed_conversions,
                channel.attributed_revenue,
                channel.average_position
            ));
        }

        output.push_str(&"=".repeat(96));
        output.push('\n');
        output.push_str(&format!("Total Revenue: {:.2}\n", self.total_revenue()));

        output
    }

    /// Format as Markdown table for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Channel Attribution: {}\n\n", self.model));
        output.push_str("| Channel | Touches | Paths | Conversions | Revenue | Avg Pos |\n");
        output.push_str("|---------|---------|-------|-------------|---------|---------|\n");
        for channel in &self.channels {
            output.push_str(&format!(
                "| {} | {} | {} | {:.2} | {:.2} | {:.2} |\n",
                channel.channel_key,
                channel.touchpoints,
                channel.conversions_in_path,
                channel.attributed_conversions,
                channel.attributed_revenue,
                channel.average_position
            ));
        }
        output.push_str(&format!("\n**Total Revenue:** {:.2}\n", self.total_revenue()));

        output
    }
}

impl fmt::Display for ChannelTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} channels)", self.model, self.channels.len())?;
        for channel in &self.channels {
            writeln!(
                f,
                "  {}: {:.2} ({:.2} conversions)",
                channel.channel_key, channel.attributed_revenue, channel.attributed_conversions
            )?;
        }
        Ok(())
    }
}

/// Global channel credits of a population-level model.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTable {
    /// Model name.
    pub model: String,
    /// Heading for the raw score column.
    pub score_label: String,
    /// Extra line printed under the title, such as the Markov baseline.
    pub note: Option<String>,
    /// Channels in model order.
    pub rows: Vec<CreditRow>,
}

impl CreditTable {
    /// Table of Markov removal effects.
    pub fn from_markov(analysis: &MarkovAnalysis) -> Self {
        Self {
            model: "markov".to_string(),
            score_label: "Removal Effect".to_string(),
            note: Some(format!(
                "Baseline conversion probability: {:.4}",
                analysis.baseline_conversion_rate
            )),
            rows: CreditRow::from_markov(analysis),
        }
    }

    /// Table of Shapley values.
    pub fn from_shapley(analysis: &ShapleyAnalysis) -> Self {
        let mut note = format!(
            "Mode: {:?}, coalition value: {:.4}",
            analysis.mode_used, analysis.total_value
        );
        if !analysis.excluded_channels.is_empty() {
            note.push_str(&format!(", excluded: {}", analysis.excluded_channels.join(", ")));
        }
        Self {
            model: "shapley".to_string(),
            score_label: "Shapley Value".to_string(),
            note: Some(note),
            rows: CreditRow::from_shapley(analysis),
        }
    }

    /// Table of presence lift.
    pub fn from_lift(results: &[LiftAttributionResult]) -> Self {
        Self {
            model: "data_driven".to_string(),
            score_label: "Lift".to_string(),
            note: None,
            rows: CreditRow::from_lift(results),
        }
    }

    /// Rows sorted by credit, highest first.
    pub fn ranked(&self) -> Vec<&CreditRow> {
        let mut rows: Vec<&CreditRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            b.attributed_credit
                .total_cmp(&a.attributed_credit)
                .then_with(|| a.channel.cmp(&b.channel))
        });
        rows
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nChannel Credits: {}\n", self.model));
        if let Some(note) = &self.note {
            output.push_str(note);
            output.push('\n');
        }
        output.push_str(&"=".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "{:<24} {:>16} {:>16}\n",
            "Channel", self.score_label, "Credit"
        ));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for row in self.ranked() {
            output.push_str(&format!(
                "{:<24} {:>16.4} {:>15.2}%\n",
                row.channel,
                row.score,
                row.attributed_credit * 100.0
            ));
        }
        output.push_str(&"=".repeat(60));
        output.push('\n');

        output
    }

    /// Format as Markdown table for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Channel Credits: {}\n\n", self.model));
        if let Some(note) = &self.note {
            output.push_str(&format!("{note}\n\n"));
        }
        output.push_str(&format!("| Channel | {} | Credit |\n", self.score_label));
        output.push_str("|---------|-------|--------|\n");
        for row in self.ranked() {
            output.push_str(&format!(
                "| {} | {:.4} | {:.2}% |\n",
                row.channel,
                row.score,
                row.attributed_credit * 100.0
            ));
        }

        output
    }
}

impl fmt::Display for CreditTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} credits", self.model)?;
        for row in self.ranked() {
            writeln!(f, "  {}: {:.2}%", row.channel, row.attributed_credit * 100.0)?;
        }
        Ok(())
    }
}

/// Funnel-stage importance table.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    /// Analysis being shown.
    pub analysis: StageAnalysis,
}

impl StageTable {
    /// Wrap an analysis.
    pub const fn new(analysis: StageAnalysis) -> Self {
        Self { analysis }
    }

    /// Flat rows for export.
    pub fn rows(&self) -> Vec<StageRow> {
        StageRow::from_analysis(&self.analysis)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let a = &self.analysis;
        let mut output = String::new();

        output.push_str(&format!("\nFunnel Stages: {}\n", a.org_id));
        output.push_str(&format!("Period: {} to {}\n", a.period_start, a.period_end));
        output.push_str(&format!(
            "Baseline: {:.4}  Visitors: {}  Quality: {}{}\n",
            a.baseline_conversion_probability,
            a.total_visitors,
            a.quality,
            if a.used_fallback { " (heuristic)" } else { "" }
        ));
        output.push_str(&"=".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "{:>4} {:<24} {:>14} {:>12} {:>12}\n",
            "#", "Stage", "Removal Eff.", "Credit", "Critical"
        ));
        output.push_str(&"-".repeat(72));
        output.push('\n');

        for stage in &a.stages {
            output.push_str(&format!(
                "{:>4} {:<24} {:>14.4} {:>11.2}% {:>12}\n",
                stage.ordinal,
                stage.name,
                stage.removal_effect,
                stage.attributed_credit * 100.0,
                if stage.is_critical { "yes" } else { "" }
            ));
        }
        output.push_str(&"=".repeat(72));
        output.push('\n');

        output
    }

    /// Format as Markdown table for documentation.
    pub fn to_markdown(&self) -> String {
        let a = &self.analysis;
        let mut output = String::new();

        output.push_str(&format!("# Funnel Stages: {}\n\n", a.org_id));
        output.push_str(&format!(
            "**Period:** {} to {}  \n**Quality:** {}\n\n",
            a.period_start, a.period_end, a.quality
        ));
        output.push_str("| # | Stage | Removal Effect | Credit | Critical |\n");
        output.push_str("|---|-------|----------------|--------|----------|\n");
        for stage in &a.stages {
            output.push_str(&format!(
                "| {} | {} | {:.4} | {:.2}% | {} |\n",
                stage.ordinal,
                stage.name,
                stage.removal_effect,
                stage.attributed_credit * 100.0,
                if stage.is_critical { "yes" } else { "no" }
            ));
        }

        output
    }
}

impl fmt::Display for StageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchline_algorithmic::{LiftAttributionResult, MarkovAttributionResult};
    use touchline_data::Channel;

    fn channel(source: &str, revenue: f64) -> AggregatedAttribution {
        let channel = Channel::new(source, Some("cpc"), None);
        AggregatedAttribution {
            channel_key: channel.key(),
            channel,
            touchpoints: 2,
            conversions_in_path: 2,
            attributed_conversions: 1.0,
            attributed_revenue: revenue,
            average_position: 1.5,
        }
    }

    #[test]
    fn test_channel_table() {
        let table = ChannelTable::new("linear", vec![channel("google", 600.0), channel("email", 400.0)]);
        assert_eq!(table.total_revenue(), 1000.0);

        let ascii = table.to_ascii_table();
        assert!(ascii.contains("Channel Attribution: linear"));
        assert!(ascii.contains("google|cpc|(none)"));
        assert!(ascii.contains("Total Revenue: 1000.00"));

        let markdown = table.to_markdown();
        assert!(markdown.contains("| google|cpc|(none) | 2 | 2 | 1.00 | 600.00 | 1.50 |"));
        assert!(table.to_string().starts_with("linear (2 channels)"));
    }

    #[test]
    fn test_credit_table_ranks_by_credit() {
        let analysis = MarkovAnalysis {
            baseline_conversion_rate: 0.25,
            results: vec![
                MarkovAttributionResult {
                    channel: "bing".to_string(),
                    removal_effect: 0.1,
                    attributed_credit: 0.2,
                },
                MarkovAttributionResult {
                    channel: "google".to_string(),
                    removal_effect: 0.4,
                    attributed_credit: 0.8,
                },
            ],
        };
        let table = CreditTable::from_markov(&analysis);
        let ranked: Vec<_> = table.ranked().iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(ranked, ["google", "bing"]);

        let ascii = table.to_ascii_table();
        assert!(ascii.contains("Baseline conversion probability: 0.2500"));
        assert!(ascii.contains("Removal Effect"));
        assert!(table.to_markdown().contains("| google | 0.4000 | 80.00% |"));
    }

    #[test]
    fn test_lift_table_has_no_note() {
        let results = vec![LiftAttributionResult {
            channel: "email".to_string(),
            conversion_presence: 0.5,
            non_conversion_presence: 0.1,
            lift: 0.4,
            attributed_credit: 1.0,
        }];
        let table = CreditTable::from_lift(&results);
        assert!(table.note.is_none());
        assert_eq!(table.to_string(), "data_driven credits\n  email: 100.00%\n");
    }
}
