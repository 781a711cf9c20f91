//! Removal effects and normalized Markov credits.

use super::matrix::TransitionMatrix;
use super::simulation::{AbsorptionMethod, analytic_conversion_rate, simulate_conversion_rate};
use super::{MarkovConfig, MarkovError};
use crate::credits::{ChannelCredits, normalize_scores};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use touchline_models::ConversionPath;
use tracing::debug;

/// Removal effect and credit for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovAttributionResult {
    /// Channel (node) label
    pub channel: String,
    /// Relative drop in conversion probability without the channel, in [0, 1]
    pub removal_effect: f64,
    /// Normalized share of all removal effects
    pub attributed_credit: f64,
}

/// Output of a Markov run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovAnalysis {
    /// Conversion probability of the full graph
    pub baseline_conversion_rate: f64,
    /// Per-channel results in state order
    pub results: Vec<MarkovAttributionResult>,
}

impl MarkovAnalysis {
    /// Normalized credit per channel.
    pub fn channel_credits(&self) -> ChannelCredits {
        self.results
            .iter()
            .map(|r| (r.channel.clone(), r.attributed_credit))
            .collect()
    }
}

/// Relative drop from `baseline` to `without`, clamped to [0, 1].
///
/// A zero baseline has nothing to lose, so the effect is 0.
pub fn removal_effect(baseline: f64, without: f64) -> f64 {
    if baseline <= 0.0 || !baseline.is_finite() {
        return 0.0;
    }
    ((baseline - without) / baseline).clamp(0.0, 1.0)
}

/// Markov removal-effect attribution model
#[derive(Debug, Clone, Default)]
pub struct MarkovModel {
    config: MarkovConfig,
}

impl MarkovModel {
    /// Create a model with a validated configuration.
    pub fn new(config: MarkovConfig) -> Result<Self, MarkovError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a model with default settings.
    pub fn try_default() -> Result<Self, MarkovError> {
        Self::new(MarkovConfig::default())
    }

    /// Active configuration.
    pub const fn config(&self) -> &MarkovConfig {
        &self.config
    }

    /// Transition matrix for a path population.
    pub fn build_matrix(
        &self,
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
    ) -> TransitionMatrix {
        TransitionMatrix::from_paths(conversions, non_conversions, self.config.grouping)
    }

    fn conversion_rate<R: Rng + ?Sized>(&self, matrix: &TransitionMatrix, rng: &mut R) -> f64 {
        match self.config.method {
            AbsorptionMethod::MonteCarlo => {
                simulate_conversion_rate(matrix, self.config.walks, self.config.max_steps, rng)
            }
            AbsorptionMethod::Analytic => analytic_conversion_rate(matrix, self.config.max_steps),
        }
    }

    /// Analyze paths with an RNG seeded from the configuration.
    pub fn analyze(
        &self,
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
    ) -> MarkovAnalysis {
        let mut rng = self
            .config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        self.analyze_with_rng(conversions, non_conversions, &mut rng)
    }

    /// Analyze paths with a caller-supplied RNG.
    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
        rng: &mut R,
    ) -> MarkovAnalysis {
        let matrix = self.build_matrix(conversions, non_conversions);
        self.analyze_matrix(&matrix, rng)
    }

    /// Removal effects for every channel state of a prepared matrix.
    pub fn analyze_matrix<R: Rng + ?Sized>(
        &self,
        matrix: &TransitionMatrix,
        rng: &mut R,
    ) -> MarkovAnalysis {
        let baseline = self.conversion_rate(matrix, rng);

        let mut effects = Vec::with_capacity(matrix.channels().len());
        for channel in matrix.channels() {
            let without = match matrix.without(channel) {
                Ok(reduced) => self.conversion_rate(&reduced, rng),
                Err(_) => baseline,
            };
            effects.push((channel.clone(), removal_effect(baseline, without)));
        }

        let credits = normalize_scores(effects.iter().cloned());
        let results = effects
            .into_iter()
            .map(|(channel, removal_effect)| MarkovAttributionResult {
                attributed_credit: credits.get(&channel).copied().unwrap_or(0.0),
                channel,
                removal_effect,
            })
            .collect::<Vec<_>>();

        debug!(
            states = matrix.dim(),
            baseline,
            method = ?self.config.method,
            "Computed Markov removal effects"
        );

        MarkovAnalysis {
            baseline_conversion_rate: baseline,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::repeat;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn population() -> (Vec<ConversionPath>, Vec<ConversionPath>) {
        let mut conversions = repeat("ge", 30, &["google", "email"], true);
        conversions.extend(repeat("f", 10, &["facebook"], true));
        let mut non_conversions = repeat("nf", 30, &["facebook"], false);
        non_conversions.extend(repeat("ng", 10, &["google"], false));
        (conversions, non_conversions)
    }

    #[rstest]
    #[case(1.0, 0.5, 0.5)]
    #[case(0.5, 0.6, 0.0)]
    #[case(0.0, 0.0, 0.0)]
    #[case(0.4, 0.0, 1.0)]
    fn test_removal_effect(#[case] baseline: f64, #[case] without: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(removal_effect(baseline, without), expected);
    }

    #[rstest]
    #[case(AbsorptionMethod::Analytic)]
    #[case(AbsorptionMethod::MonteCarlo)]
    fn test_credits_are_normalized(#[case] method: AbsorptionMethod) {
        let (conversions, non_conversions) = population();
        let model = MarkovModel::new(MarkovConfig {
            method,
            seed: Some(42),
            ..MarkovConfig::default()
        })
        .unwrap();

        let analysis = model.analyze(&conversions, &non_conversions);
        assert_eq!(analysis.results.len(), 3);

        let total: f64 = analysis.results.iter().map(|r| r.attributed_credit).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        for result in &analysis.results {
            assert!((0.0..=1.0).contains(&result.removal_effect));
            assert!(result.attributed_credit >= 0.0);
        }
    }

    #[test]
    fn test_analytic_removal_effects() {
        let (conversions, non_conversions) = population();
        let model = MarkovModel::new(MarkovConfig {
            method: AbsorptionMethod::Analytic,
            ..MarkovConfig::default()
        })
        .unwrap();
        let analysis = model.analyze(&conversions, &non_conversions);

        // start: google 40/80, facebook 40/80
        // google: email 30/40, null 10/40; email: conversion 1; facebook: conversion 10/40
        assert_abs_diff_eq!(analysis.baseline_conversion_rate, 0.5, epsilon = 1e-9);

        let credits = analysis.channel_credits();
        let effect = |c: &str| {
            analysis
                .results
                .iter()
                .find(|r| r.channel == c)
                .map(|r| r.removal_effect)
                .unwrap()
        };
        assert_abs_diff_eq!(effect("google"), 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(effect("email"), 0.75, epsilon = 1e-9);
        assert_abs_diff_eq!(effect("facebook"), 0.25, epsilon = 1e-9);
        assert!(credits["google"] > credits["facebook"]);
    }

    #[test]
    fn test_no_conversions_splits_equally() {
        let non_conversions = repeat("n", 4, &["google", "email"], false);
        let analysis = MarkovModel::try_default()
            .unwrap()
            .analyze(&[], &non_conversions);

        assert_eq!(analysis.baseline_conversion_rate, 0.0);
        for result in &analysis.results {
            assert_eq!(result.removal_effect, 0.0);
            assert_abs_diff_eq!(result.attributed_credit, 0.5);
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = MarkovConfig {
            walks: 0,
            ..MarkovConfig::default()
        };
        assert!(MarkovModel::new(config).is_err());
    }
}
