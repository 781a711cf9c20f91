//! Global channel credits and their application to single paths.
//!
//! Markov, Shapley and lift models produce one credit per channel for the
//! whole population. To credit a concrete conversion, the channels present in
//! its path share the conversion in proportion to their global credit, and a
//! channel's share is split evenly over its touchpoints in that path.

use std::collections::BTreeMap;
use touchline_data::ChannelGrouping;
use touchline_models::direct::{chronological, distribute};
use touchline_models::{AttributedTouchpoint, ConversionPath};

/// Channel label → normalized credit.
pub type ChannelCredits = BTreeMap<String, f64>;

/// Clamp scores at zero and normalize them to sum to one.
///
/// Negative and non-finite scores count as zero. When nothing is positive the
/// channels share equally.
pub fn normalize_scores<I>(scores: I) -> ChannelCredits
where
    I: IntoIterator<Item = (String, f64)>,
{
    let clamped: ChannelCredits = scores
        .into_iter()
        .map(|(channel, score)| {
            let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
            (channel, score)
        })
        .collect();

    if clamped.is_empty() {
        return clamped;
    }

    let total: f64 = clamped.values().sum();
    if total > 0.0 {
        clamped
            .into_iter()
            .map(|(channel, score)| (channel, score / total))
            .collect()
    } else {
        let equal = 1.0 / clamped.len() as f64;
        clamped.into_keys().map(|channel| (channel, equal)).collect()
    }
}

/// Credit one path from global channel credits.
///
/// Channels missing from `credits` get nothing; if no channel in the path has
/// credit, every touchpoint gets an equal share.
pub fn apply_channel_credits(
    path: &ConversionPath,
    credits: &ChannelCredits,
    grouping: ChannelGrouping,
) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(&path.touchpoints);

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for touchpoint in &sorted {
        *counts.entry(touchpoint.channel.label(grouping)).or_default() += 1;
    }

    let present_total: f64 = counts
        .keys()
        .map(|label| credits.get(label).copied().unwrap_or(0.0).max(0.0))
        .sum();

    let weights: Vec<f64> = if present_total > 0.0 {
        sorted
            .iter()
            .map(|t| {
                let label = t.channel.label(grouping);
                let credit = credits.get(&label).copied().unwrap_or(0.0).max(0.0);
                let count = counts.get(&label).copied().unwrap_or(1) as f64;
                credit / present_total / count
            })
            .collect()
    } else {
        vec![1.0; sorted.len()]
    };

    distribute(sorted, &weights, path.conversion_value)
}
