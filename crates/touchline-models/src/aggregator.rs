//! Channel Aggregator
//!
//! Reduces per-path attribution results to per-channel totals.

use crate::journey::AttributionResult;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use touchline_data::Channel;

/// Per-channel totals across many attribution results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedAttribution {
    /// Channel descriptor
    pub channel: Channel,
    /// `source|medium|campaign` key
    pub channel_key: String,
    /// Touchpoints seen on this channel
    pub touchpoints: usize,
    /// Distinct converting paths the channel appeared in
    pub conversions_in_path: usize,
    /// Sum of fractional conversions credited (`credit_percentage / 100`)
    pub attributed_conversions: f64,
    /// Sum of credited value
    pub attributed_revenue: f64,
    /// Mean 1-indexed position of the channel's touchpoints
    pub average_position: f64,
}

#[derive(Default)]
struct Accumulator<'a> {
    channel: Option<Channel>,
    touchpoints: usize,
    paths: HashSet<&'a str>,
    conversions: f64,
    revenue: f64,
    position_sum: usize,
}

/// Aggregate results by channel, highest revenue first.
///
/// Ties in revenue are ordered by channel key.
pub fn aggregate(results: &[AttributionResult]) -> Vec<AggregatedAttribution> {
    let mut by_channel: HashMap<String, Accumulator<'_>> = HashMap::new();

    for result in results {
        for (index, attributed) in result.touchpoints.iter().enumerate() {
            let channel = &attributed.touchpoint.channel;
            let acc = by_channel.entry(channel.key()).or_default();
            if acc.channel.is_none() {
                acc.channel = Some(channel.clone());
            }
            acc.touchpoints += 1;
            acc.paths.insert(result.path_id.as_str());
            acc.conversions += attributed.credit_percentage / 100.0;
            acc.revenue += attributed.credit;
            acc.position_sum += index + 1;
        }
    }

    let mut aggregated: Vec<AggregatedAttribution> = by_channel
        .into_iter()
        .filter_map(|(key, acc)| {
            let channel = acc.channel?;
            Some(AggregatedAttribution {
                channel,
                channel_key: key,
                touchpoints: acc.touchpoints,
                conversions_in_path: acc.paths.len(),
                attributed_conversions: acc.conversions,
                attributed_revenue: acc.revenue,
                average_position: acc.position_sum as f64 / acc.touchpoints as f64,
            })
        })
        .collect();

    aggregated.sort_by(|a, b| {
        b.attributed_revenue
            .total_cmp(&a.attributed_revenue)
            .then_with(|| a.channel_key.cmp(&b.channel_key))
    });

    aggregated
}

/// Total revenue over all aggregates.
pub fn total_revenue(aggregates: &[AggregatedAttribution]) -> f64 {
    aggregates.iter().map(|a| a.attributed_revenue).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::{first_touch, linear};
    use crate::journey::{ConversionPath, Touchpoint};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn path(id: &str, sources: &[&str], value: f64) -> ConversionPath {
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let touchpoints = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                Touchpoint::new(
                    format!("{id}-{i}"),
                    end - Duration::days((sources.len() - i) as i64),
                    Channel::new(*source, Some("cpc"), None),
                )
            })
            .collect();
        ConversionPath::new(id, touchpoints, end, value)
    }

    fn attribute_linear(paths: &[ConversionPath]) -> Vec<AttributionResult> {
        paths
            .iter()
            .map(|p| AttributionResult::new(p, "linear", linear(&p.touchpoints, p.conversion_value)))
            .collect()
    }

    #[test]
    fn test_aggregate_totals() {
        let paths = [
            path("c1", &["google", "email"], 100.0),
            path("c2", &["google", "google", "facebook"], 300.0),
        ];
        let aggregated = aggregate(&attribute_linear(&paths));

        assert_eq!(aggregated.len(), 3);
        let google = &aggregated[0];
        assert_eq!(google.channel.source, "google");
        assert_eq!(google.touchpoints, 3);
        assert_eq!(google.conversions_in_path, 2);
        assert_relative_eq!(google.attributed_revenue, 250.0);
        assert_relative_eq!(google.attributed_conversions, 0.5 + 2.0 / 3.0);
        assert_relative_eq!(google.average_position, (1.0 + 1.0 + 2.0) / 3.0);

        assert_relative_eq!(total_revenue(&aggregated), 400.0);
    }

    #[test]
    fn test_ties_sorted_by_key() {
        let paths = [path("c1", &["zeta"], 10.0), path("c2", &["alpha"], 10.0)];
        let results: Vec<_> = paths
            .iter()
            .map(|p| AttributionResult::new(p, "first_touch", first_touch(&p.touchpoints, 10.0)))
            .collect();
        let aggregated = aggregate(&results);
        assert_eq!(aggregated[0].channel.source, "alpha");
        assert_eq!(aggregated[1].channel.source, "zeta");
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
