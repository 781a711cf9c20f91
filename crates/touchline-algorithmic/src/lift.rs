//! Data-driven presence lift.
//!
//! A channel's lift is how much more often it shows up in converting paths
//! than in non-converting ones. Negative lift carries no credit.

use crate::credits::{ChannelCredits, normalize_scores};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use touchline_data::ChannelGrouping;
use touchline_models::ConversionPath;
use tracing::debug;

/// Presence rates, lift and credit for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftAttributionResult {
    /// Channel label
    pub channel: String,
    /// Share of converting paths that contain the channel
    pub conversion_presence: f64,
    /// Share of non-converting paths that contain the channel
    pub non_conversion_presence: f64,
    /// `conversion_presence - non_conversion_presence`
    pub lift: f64,
    /// Normalized share of all clamped lifts
    pub attributed_credit: f64,
}

fn presence(
    paths: &[ConversionPath],
    grouping: ChannelGrouping,
    counts: &mut BTreeMap<String, (usize, usize)>,
    converting: bool,
) {
    for path in paths {
        for label in path.distinct_labels(grouping) {
            let entry = counts.entry(label).or_default();
            if converting {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { count as f64 / total as f64 }
}

/// Lift per channel over both populations, ordered by channel label.
pub fn data_driven_lift(
    conversions: &[ConversionPath],
    non_conversions: &[ConversionPath],
    grouping: ChannelGrouping,
) -> Vec<LiftAttributionResult> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    presence(conversions, grouping, &mut counts, true);
    presence(non_conversions, grouping, &mut counts, false);

    let mut results: Vec<LiftAttributionResult> = counts
        .into_iter()
        .map(|(channel, (converting, non_converting))| {
            let conversion_presence = rate(converting, conversions.len());
            let non_conversion_presence = rate(non_converting, non_conversions.len());
            LiftAttributionResult {
                channel,
                conversion_presence,
                non_conversion_presence,
                lift: conversion_presence - non_conversion_presence,
                attributed_credit: 0.0,
            }
        })
        .collect();

    let credits = normalize_scores(results.iter().map(|r| (r.channel.clone(), r.lift)));
    for result in &mut results {
        result.attributed_credit = credits.get(&result.channel).copied().unwrap_or(0.0);
    }

    debug!(
        channels = results.len(),
        conversions = conversions.len(),
        non_conversions = non_conversions.len(),
        "Computed presence lift"
    );
    results
}

/// Normalized lift credit per channel.
pub fn lift_credits(results: &[LiftAttributionResult]) -> ChannelCredits {
    results
        .iter()
        .map(|r| (r.channel.clone(), r.attributed_credit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::repeat;
    use approx::assert_abs_diff_eq;

    fn find<'a>(results: &'a [LiftAttributionResult], channel: &str) -> &'a LiftAttributionResult {
        results.iter().find(|r| r.channel == channel).unwrap()
    }

    #[test]
    fn test_converting_only_channel_gets_positive_weight() {
        let mut conversions = repeat("ge", 4, &["google", "email"], true);
        conversions.extend(repeat("g", 4, &["google"], true));
        let non_conversions = repeat("nf", 5, &["facebook"], false);

        let results = data_driven_lift(&conversions, &non_conversions, ChannelGrouping::Source);
        let google = find(&results, "google");
        assert_abs_diff_eq!(google.conversion_presence, 1.0);
        assert_abs_diff_eq!(google.non_conversion_presence, 0.0);
        assert!(google.attributed_credit > 0.0);

        assert_eq!(find(&results, "facebook").attributed_credit, 0.0);
        assert_abs_diff_eq!(find(&results, "email").lift, 0.5);

        let total: f64 = results.iter().map(|r| r.attributed_credit).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lift_credits(&results)["google"], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_lift_gets_no_credit() {
        let conversions = repeat("g", 1, &["google"], true);
        let mut non_conversions = repeat("ng", 2, &["google"], false);
        non_conversions.extend(repeat("nb", 2, &["bing"], false));

        let results = data_driven_lift(&conversions, &non_conversions, ChannelGrouping::Source);
        // google: 1.0 - 0.5 > 0, bing: 0 - 0.5 < 0
        assert_abs_diff_eq!(find(&results, "google").attributed_credit, 1.0);

        let only_non = data_driven_lift(&[], &non_conversions, ChannelGrouping::Source);
        for result in &only_non {
            assert_abs_diff_eq!(result.attributed_credit, 0.5);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(data_driven_lift(&[], &[], ChannelGrouping::Source).is_empty());
    }
}
