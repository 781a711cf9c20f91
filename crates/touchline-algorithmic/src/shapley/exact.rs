//! Exact Shapley values by enumerating every coalition.

use super::coalition::{CoalitionGame, Subsets};

/// Shapley value of every player, indexed like [`CoalitionGame::channels`].
///
/// `v` is tabulated once for all `2^n` coalitions, then each player sums
/// `|S|!(n-|S|-1)!/n! * (v(S ∪ {i}) - v(S))` over the coalitions without it.
/// Callers keep `n` small; cost and memory are `O(2^n)`.
pub fn exact_shapley(game: &CoalitionGame) -> Vec<f64> {
    let n = game.len();
    if n == 0 {
        return Vec::new();
    }

    let values: Vec<f64> = Subsets::new(n).map(|s| game.value(&s)).collect();

    let mut factorials = vec![1.0_f64; n + 1];
    for k in 1..=n {
        factorials[k] = factorials[k - 1] * k as f64;
    }
    let weights: Vec<f64> = (0..n)
        .map(|size| factorials[size] * factorials[n - size - 1] / factorials[n])
        .collect();

    (0..n)
        .map(|i| {
            Subsets::new(n)
                .filter(|s| !s.contains(i))
                .map(|s| weights[s.len()] * (values[s.with(i).index()] - values[s.index()]))
                .sum()
        })
        .collect()
}
