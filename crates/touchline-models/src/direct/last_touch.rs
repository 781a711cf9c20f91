//! Last-touch attribution: all credit to the touchpoint closest to conversion.

use super::{chronological, distribute};
use crate::journey::{AttributedTouchpoint, Touchpoint};

/// Credit the chronologically last touchpoint with the whole conversion.
pub fn last_touch(touchpoints: &[Touchpoint], conversion_value: f64) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(touchpoints);
    let mut weights = vec![0.0; sorted.len()];
    if let Some(last) = weights.last_mut() {
        *last = 1.0;
    }
    distribute(sorted, &weights, conversion_value)
}
