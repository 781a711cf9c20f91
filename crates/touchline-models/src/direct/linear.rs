//! Linear attribution: equal credit for every touchpoint.

use super::{chronological, distribute};
use crate::journey::{AttributedTouchpoint, Touchpoint};

/// Split the conversion evenly over all touchpoints.
pub fn linear(touchpoints: &[Touchpoint], conversion_value: f64) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(touchpoints);
    let weights = vec![1.0; sorted.len()];
    distribute(sorted, &weights, conversion_value)
}
