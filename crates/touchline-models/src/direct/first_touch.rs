//! First-touch attribution: all credit to the earliest touchpoint.

use super::{chronological, distribute};
use crate::journey::{AttributedTouchpoint, Touchpoint};

/// Credit the chronologically first touchpoint with the whole conversion.
pub fn first_touch(touchpoints: &[Touchpoint], conversion_value: f64) -> Vec<AttributedTouchpoint> {
    let sorted = chronological(touchpoints);
    let mut weights = vec![0.0; sorted.len()];
    if let Some(first) = weights.first_mut() {
        *first = 1.0;
    }
    distribute(sorted, &weights, conversion_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::test_support::*;

    #[test]
    fn test_earliest_gets_everything_regardless_of_input_order() {
        let tps = touchpoints(&[("email", 1.0), ("google", 10.0), ("facebook", 5.0)]);
        let out = first_touch(&tps, 500.0);

        let full: Vec<_> = out.iter().filter(|t| t.credit_percentage == 100.0).collect();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].touchpoint.channel.source, "google");
        assert_eq!(out[0].credit, 500.0);
    }

    #[test]
    fn test_empty_path() {
        assert!(first_touch(&[], 100.0).is_empty());
    }
}
