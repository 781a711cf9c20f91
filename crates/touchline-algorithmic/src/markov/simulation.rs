//! Absorption probability of the conversion state.
//!
//! Two estimators are provided. Monte-Carlo random walks follow the classic
//! removal-effect formulation and take an injectable RNG so results can be
//! reproduced. Value iteration over the transient states is deterministic and
//! converges to the exact absorption probability.

use super::matrix::TransitionMatrix;
use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the conversion probability from `start` is computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsorptionMethod {
    /// Random walks from `start`
    #[default]
    MonteCarlo,
    /// Value iteration over the transient sub-matrix
    Analytic,
}

/// Fraction of `walks` random walks from `start` that reach `conversion`.
///
/// A walk ends as non-converting when it reaches `null`, lands on a state
/// with no outgoing transitions, or exceeds `max_steps`.
pub fn simulate_conversion_rate<R: Rng + ?Sized>(
    matrix: &TransitionMatrix,
    walks: usize,
    max_steps: usize,
    rng: &mut R,
) -> f64 {
    if walks == 0 {
        return 0.0;
    }

    let probabilities = matrix.probabilities();
    let conversion = matrix.conversion_index();
    let null = matrix.null_index();
    let mut converted = 0usize;

    for _ in 0..walks {
        let mut state = matrix.start_index();

        for _ in 0..max_steps {
            let row = probabilities.row(state);
            let total: f64 = row.sum();
            if total <= 0.0 {
                break;
            }

            let draw = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            let mut next = None;
            for (j, &p) in row.iter().enumerate() {
                if p <= 0.0 {
                    continue;
                }
                cumulative += p;
                next = Some(j);
                if draw < cumulative {
                    break;
                }
            }

            let Some(next) = next else {
                break;
            };
            if next == conversion {
                converted += 1;
                break;
            }
            if next == null {
                break;
            }
            state = next;
        }
    }

    converted as f64 / walks as f64
}

/// Probability of absorbing in `conversion` from `start` by value iteration.
///
/// Iterates `p ← P·p` with `p[conversion] = 1` and `p[null] = 0` fixed, for at
/// most `max_sweeps` sweeps or until no entry moves by more than 1e-12.
pub fn analytic_conversion_rate(matrix: &TransitionMatrix, max_sweeps: usize) -> f64 {
    let n = matrix.dim();
    let conversion = matrix.conversion_index();
    let null = matrix.null_index();
    let probabilities = matrix.probabilities();

    let mut values = Array1::<f64>::zeros(n);
    values[conversion] = 1.0;

    for _ in 0..max_sweeps {
        let mut next = probabilities.dot(&values);
        next[conversion] = 1.0;
        next[null] = 0.0;

        let delta = next
            .iter()
            .zip(values.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        values = next;
        if delta < 1e-12 {
            break;
        }
    }

    values[matrix.start_index()].clamp(0.0, 1.0)
}
