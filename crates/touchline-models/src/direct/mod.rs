//! Direct attribution models.
//!
//! Each model looks at a single path's touchpoints and hands every touchpoint a
//! weight. Weights are normalized, so credits always add up to the conversion
//! value and percentages to 100, even for a zero-value conversion.

pub mod first_touch;
pub mod last_touch;
pub mod linear;
pub mod position_based;
pub mod time_decay;

pub use first_touch::first_touch;
pub use last_touch::last_touch;
pub use linear::linear;
pub use position_based::{PositionWeights, position_based};
pub use time_decay::{TimeDecayConfig, time_decay};

use crate::journey::{AttributedTouchpoint, Touchpoint};

/// Touchpoints in chronological order; ties keep their input order.
pub fn chronological(touchpoints: &[Touchpoint]) -> Vec<Touchpoint> {
    let mut sorted = touchpoints.to_vec();
    sorted.sort_by_key(|t| t.timestamp);
    sorted
}

/// Split `value` over touchpoints proportionally to `weights`.
///
/// Negative or non-finite weights count as zero. When no weight is positive
/// every touchpoint gets an equal share.
pub fn distribute(
    touchpoints: Vec<Touchpoint>,
    weights: &[f64],
    value: f64,
) -> Vec<AttributedTouchpoint> {
    let n = touchpoints.len();
    if n == 0 {
        return Vec::new();
    }

    let cleaned: Vec<f64> = (0..n)
        .map(|i| weights.get(i).copied().filter(|w| w.is_finite()).unwrap_or(0.0).max(0.0))
        .collect();
    let total: f64 = cleaned.iter().sum();

    let shares: Vec<f64> = if total > 0.0 {
        cleaned.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / n as f64; n]
    };

    touchpoints
        .into_iter()
        .zip(shares)
        .map(|(touchpoint, share)| AttributedTouchpoint {
            touchpoint,
            credit: value * share,
            credit_percentage: share * 100.0,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::journey::Touchpoint;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use touchline_data::Channel;

    pub(crate) fn conversion_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    /// Touchpoints `(source, days before conversion)` in the given order.
    pub(crate) fn touchpoints(layout: &[(&str, f64)]) -> Vec<Touchpoint> {
        layout
            .iter()
            .enumerate()
            .map(|(i, (source, days))| {
                let offset = Duration::milliseconds((days * 86_400_000.0) as i64);
                Touchpoint::new(
                    format!("e{i}"),
                    conversion_time() - offset,
                    Channel::new(*source, Some("cpc"), None),
                )
            })
            .collect()
    }

    pub(crate) fn credits(attributed: &[crate::journey::AttributedTouchpoint]) -> Vec<f64> {
        attributed.iter().map(|t| t.credit).collect()
    }
}
