//! Time-decay attribution.
//!
//! Touchpoints closer to the conversion earn more: a touchpoint `d` days
//! before conversion has weight `2^(-d / half_life_days)`.

use super::{chronological, distribute};
use crate::error::ModelError;
use crate::journey::{AttributedTouchpoint, Touchpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for time-decay attribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeDecayConfig {
    /// Days for a touchpoint's weight to halve (default: 7)
    pub half_life_days: f64,
}

impl Default for TimeDecayConfig {
    fn default() -> Self {
        Self {
            half_life_days: 7.0,
        }
    }
}

impl TimeDecayConfig {
    /// Create a validated configuration.
    pub fn new(half_life_days: f64) -> Result<Self, ModelError> {
        let config = Self { half_life_days };
        config.validate()?;
        Ok(config)
    }

    /// Check that the half-life is a positive finite number.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "half-life must be positive, got {}",
                self.half_life_days
            )));
        }
        Ok(())
    }

    /// Weight of a touchpoint `days` before conversion.
    pub fn weight(&self, days: f64) -> f64 {
        0.5_f64.powf(days.max(0.0) / self.half_life_days)
    }
}

/// Weight touchpoints by exponential decay towards `converted_at`.
pub fn time_decay(
    touchpoints: &[Touchpoint],
    conversion_value: f64,
    converted_at: DateTime<Utc>,
    config: &TimeDecayConfig,
) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(touchpoints);
    let weights: Vec<f64> = sorted
        .iter()
        .map(|t| config.weight(t.days_before(converted_at)))
        .collect();
    distribute(sorted, &weights, conversion_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::test_support::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_half_life_split() {
        let config = TimeDecayConfig::default();
        let tps = touchpoints(&[("recent", 0.0), ("old", config.half_life_days)]);
        let out = time_decay(&tps, 300.0, conversion_time(), &config);

        // Output is chronological, so the older touchpoint comes first
        assert_eq!(out[0].touchpoint.channel.source, "old");
        assert_abs_diff_eq!(out[0].credit_percentage, 100.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[1].credit_percentage, 200.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[1].credit, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_weight_halves_each_half_life() {
        let config = TimeDecayConfig::new(2.0).unwrap();
        assert_abs_diff_eq!(config.weight(0.0), 1.0);
        assert_abs_diff_eq!(config.weight(2.0), 0.5);
        assert_abs_diff_eq!(config.weight(4.0), 0.25);
        assert_abs_diff_eq!(config.weight(-3.0), 1.0);
    }

    #[test]
    fn test_fractional_days() {
        let config = TimeDecayConfig::new(1.0).unwrap();
        let tps = touchpoints(&[("a", 0.5), ("b", 0.0)]);
        let out = time_decay(&tps, 1.0, conversion_time(), &config);
        let ratio = out[0].credit / out[1].credit;
        assert_abs_diff_eq!(ratio, 0.5_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_half_life() {
        assert!(TimeDecayConfig::new(0.0).is_err());
        assert!(TimeDecayConfig::new(f64::NAN).is_err());
        assert!(TimeDecayConfig::new(-1.0).is_err());
    }
}
