//! Shapley values estimated from random join orders.

use super::coalition::CoalitionGame;
use rand::Rng;
use rand::seq::SliceRandom;

/// Average marginal contribution of each player over `samples` random
/// permutations.
///
/// Each permutation grows the coalition one player at a time, keeping running
/// conversion and path totals over the signatures covered so far. A player's
/// marginal contribution is the change in conversion rate when its uncovered
/// signatures join, so every permutation costs one pass over the signatures
/// regardless of the player count.
pub fn sampled_shapley<R: Rng + ?Sized>(game: &CoalitionGame, samples: usize, rng: &mut R) -> Vec<f64> {
    let n = game.len();
    if n == 0 || samples == 0 {
        return vec![0.0; n];
    }

    let signatures = game.signatures();
    let mut totals = vec![0.0; n];
    let mut order: Vec<usize> = (0..n).collect();
    let mut covered = vec![false; signatures.len()];

    for _ in 0..samples {
        order.shuffle(rng);
        covered.fill(false);

        let (mut conversions, mut paths) = (0, 0);
        let mut before = 0.0;
        for &player in &order {
            for &s in game.signatures_with(player) {
                if !covered[s] {
                    covered[s] = true;
                    conversions += signatures[s].conversions;
                    paths += signatures[s].paths;
                }
            }
            let after = CoalitionGame::rate(conversions, paths);
            totals[player] += after - before;
            before = after;
        }
    }

    totals.into_iter().map(|t| t / samples as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{path, repeat};
    use crate::shapley::exact::exact_shapley;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use touchline_data::ChannelGrouping;

    fn game() -> CoalitionGame {
        let mut conversions = repeat("ab", 6, &["a", "b"], true);
        conversions.extend(repeat("bc", 3, &["b", "c"], true));
        conversions.push(path("d", &["d"], true));
        let non_conversions = repeat("na", 5, &["a", "d"], false);
        let channels = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        CoalitionGame::from_paths(&conversions, &non_conversions, channels, ChannelGrouping::Source)
    }

    #[test]
    fn test_every_permutation_is_efficient() {
        // One sample already distributes exactly v(N)
        let game = game();
        let mut rng = StdRng::seed_from_u64(1);
        let values = sampled_shapley(&game, 1, &mut rng);
        let total: f64 = values.iter().sum();
        assert_abs_diff_eq!(total, game.grand_value(), epsilon = 1e-12);
    }

    #[test]
    fn test_converges_to_exact() {
        let game = game();
        let mut rng = StdRng::seed_from_u64(21);
        let sampled = sampled_shapley(&game, 20_000, &mut rng);
        let exact = exact_shapley(&game);
        for (s, e) in sampled.iter().zip(&exact) {
            assert_abs_diff_eq!(*s, *e, epsilon = 0.01);
        }
    }

    #[test]
    fn test_zero_samples() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampled_shapley(&game(), 0, &mut rng), vec![0.0; 4]);
    }
}
