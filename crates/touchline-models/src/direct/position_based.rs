//! Position-based (U-shaped) attribution.
//!
//! The first and last touchpoints get fixed shares and the middle share is
//! split evenly between everything in between. With exactly two touchpoints
//! there is no middle; the first and last shares are rescaled to sum to one
//! and the middle weight is not used.

use super::{chronological, distribute};
use crate::error::ModelError;
use crate::journey::{AttributedTouchpoint, Touchpoint};
use serde::{Deserialize, Serialize};

/// Shares for first, last and middle touchpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionWeights {
    /// Share of the first touchpoint (default: 0.4)
    pub first: f64,
    /// Share of the last touchpoint (default: 0.4)
    pub last: f64,
    /// Share split across middle touchpoints (default: 0.2)
    pub middle: f64,
}

impl Default for PositionWeights {
    fn default() -> Self {
        Self {
            first: 0.4,
            last: 0.4,
            middle: 0.2,
        }
    }
}

impl PositionWeights {
    /// Create validated weights.
    pub fn new(first: f64, last: f64, middle: f64) -> Result<Self, ModelError> {
        let weights = Self {
            first,
            last,
            middle,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Weights must be finite, non-negative and have a positive sum.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [
            ("first", self.first),
            ("last", self.last),
            ("middle", self.middle),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidWeights(format!(
                    "{name} weight must be finite and non-negative, got {value}"
                )));
            }
        }

        if self.first + self.last + self.middle <= 0.0 {
            return Err(ModelError::InvalidWeights(
                "weights must have a positive sum".to_string(),
            ));
        }

        Ok(())
    }

    /// Raw weight of each position for a path of length `n`.
    pub fn for_length(&self, n: usize) -> Vec<f64> {
        match n {
            0 => Vec::new(),
            1 => vec![1.0],
            2 => vec![self.first, self.last],
            _ => {
                let middle = self.middle / (n - 2) as f64;
                let mut weights = vec![middle; n];
                weights[0] = self.first;
                weights[n - 1] = self.last;
                weights
            }
        }
    }
}

/// Attribute with U-shaped position weights.
pub fn position_based(
    touchpoints: &[Touchpoint],
    conversion_value: f64,
    weights: &PositionWeights,
) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(touchpoints);
    let raw = weights.for_length(sorted.len());
    distribute(sorted, &raw, conversion_value)
}
