//! Transition matrix over channels and absorbing states.

use super::MarkovError;
use ndarray::Array2;
use std::collections::{BTreeSet, HashMap};
use touchline_data::ChannelGrouping;
use touchline_models::ConversionPath;

/// Entry state of every walk.
pub const START_STATE: &str = "start";
/// Absorbing conversion state.
pub const CONVERSION_STATE: &str = "conversion";
/// Absorbing non-conversion state.
pub const NULL_STATE: &str = "null";

/// Row-stochastic transition matrix.
///
/// States are ordered `start`, the channels in sorted order, `conversion`,
/// `null`. Rows without observations stay all zero, as do the absorbing rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    states: Vec<String>,
    index: HashMap<String, usize>,
    probabilities: Array2<f64>,
}

impl TransitionMatrix {
    /// Build from conversion and non-conversion paths.
    ///
    /// Each path contributes `start → c1 → … → cn → conversion|null`; an empty
    /// converting path contributes `start → conversion`.
    pub fn from_paths(
        conversions: &[ConversionPath],
        non_conversions: &[ConversionPath],
        grouping: ChannelGrouping,
    ) -> Self {
        let channels: BTreeSet<String> = conversions
            .iter()
            .chain(non_conversions)
            .flat_map(|p| p.distinct_labels(grouping))
            .collect();

        let mut matrix = Self::empty(channels.into_iter().collect());
        let start = matrix.start_index();

        let paths = conversions
            .iter()
            .map(|p| (p, matrix.conversion_index()))
            .chain(non_conversions.iter().map(|p| (p, matrix.null_index())))
            .collect::<Vec<_>>();

        for (path, terminal) in paths {
            let mut previous = start;
            for label in path.labels(grouping) {
                // Labels come from the same paths, so the lookup always hits
                if let Some(&current) = matrix.index.get(&label) {
                    matrix.probabilities[[previous, current]] += 1.0;
                    previous = current;
                }
            }
            matrix.probabilities[[previous, terminal]] += 1.0;
        }

        matrix.normalize_rows();
        matrix
    }

    /// All-zero matrix over the given channel states.
    pub fn empty(channels: Vec<String>) -> Self {
        let mut states = Vec::with_capacity(channels.len() + 3);
        states.push(START_STATE.to_string());
        states.extend(channels);
        states.push(CONVERSION_STATE.to_string());
        states.push(NULL_STATE.to_string());

        let index = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        let n = states.len();

        Self {
            states,
            index,
            probabilities: Array2::zeros((n, n)),
        }
    }

    /// Wrap an existing probability matrix for the given channel states.
    pub fn from_probabilities(
        channels: Vec<String>,
        probabilities: Array2<f64>,
    ) -> Result<Self, MarkovError> {
        let mut matrix = Self::empty(channels);
        let n = matrix.states.len();
        let (rows, cols) = probabilities.dim();
        if rows != n || cols != n {
            return Err(MarkovError::DimensionMismatch {
                expected: n,
                actual: if rows != n { rows } else { cols },
            });
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(MarkovError::InvalidParameter(
                "transition probabilities must be finite and non-negative".to_string(),
            ));
        }
        matrix.probabilities = probabilities;
        Ok(matrix)
    }

    fn normalize_rows(&mut self) {
        for mut row in self.probabilities.rows_mut() {
            let total: f64 = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
    }

    /// Ordered state names.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Channel states, in matrix order.
    pub fn channels(&self) -> &[String] {
        &self.states[1..self.states.len() - 2]
    }

    /// Number of states.
    pub fn dim(&self) -> usize {
        self.states.len()
    }

    /// The probability matrix.
    pub const fn probabilities(&self) -> &Array2<f64> {
        &self.probabilities
    }

    /// Index of a state by name.
    pub fn index_of(&self, state: &str) -> Option<usize> {
        self.index.get(state).copied()
    }

    /// Transition probability between two named states.
    pub fn probability(&self, from: &str, to: &str) -> Result<f64, MarkovError> {
        let i = self
            .index_of(from)
            .ok_or_else(|| MarkovError::UnknownState(from.to_string()))?;
        let j = self
            .index_of(to)
            .ok_or_else(|| MarkovError::UnknownState(to.to_string()))?;
        Ok(self.probabilities[[i, j]])
    }

    /// Index of `start`.
    pub const fn start_index(&self) -> usize {
        0
    }

    /// Index of `conversion`.
    pub fn conversion_index(&self) -> usize {
        self.states.len() - 2
    }

    /// Index of `null`.
    pub fn null_index(&self) -> usize {
        self.states.len() - 1
    }

    /// Copy of the graph with a channel removed.
    ///
    /// The channel's own row sends everything to `null` and every transition
    /// into it is redirected to `null`.
    pub fn without(&self, channel: &str) -> Result<Self, MarkovError> {
        let removed = self
            .index_of(channel)
            .filter(|&i| i != self.start_index() && i < self.conversion_index())
            .ok_or_else(|| MarkovError::UnknownState(channel.to_string()))?;
        let null = self.null_index();

        let mut reduced = self.clone();
        let probabilities = &mut reduced.probabilities;

        for row in 0..self.dim() {
            if row == removed {
                continue;
            }
            let mass = probabilities[[row, removed]];
            if mass > 0.0 {
                probabilities[[row, removed]] = 0.0;
                probabilities[[row, null]] += mass;
            }
        }

        probabilities.row_mut(removed).fill(0.0);
        probabilities[[removed, null]] = 1.0;

        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::path;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_states_and_shape() {
        let conversions = [path("c1", &["google", "email"], true)];
        let non_conversions = [path("n1", &["facebook"], false)];
        let matrix = TransitionMatrix::from_paths(&conversions, &non_conversions, ChannelGrouping::Source);

        assert_eq!(
            matrix.states(),
            ["start", "email", "facebook", "google", "conversion", "null"]
        );
        assert_eq!(matrix.probabilities().dim(), (6, 6));
        assert_eq!(matrix.channels(), ["email", "facebook", "google"]);
        assert!(matrix.probability("email", "conversion").unwrap() > 0.0);
    }

    #[test]
    fn test_rows_are_stochastic_or_zero() {
        let conversions = [
            path("c1", &["google", "email"], true),
            path("c2", &["google"], true),
        ];
        let non_conversions = [path("n1", &["google", "facebook"], false)];
        let matrix = TransitionMatrix::from_paths(&conversions, &non_conversions, ChannelGrouping::Source);

        for (i, row) in matrix.probabilities().rows().into_iter().enumerate() {
            let total: f64 = row.sum();
            if i >= matrix.conversion_index() {
                assert_eq!(total, 0.0);
            } else {
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
            }
        }

        assert_abs_diff_eq!(matrix.probability("start", "google").unwrap(), 1.0);
        assert_abs_diff_eq!(matrix.probability("google", "conversion").unwrap(), 1.0 / 3.0);
        assert_abs_diff_eq!(matrix.probability("google", "email").unwrap(), 1.0 / 3.0);
        assert_abs_diff_eq!(matrix.probability("facebook", "null").unwrap(), 1.0);
    }

    #[test]
    fn test_empty_converting_path() {
        let conversions = [path("c1", &[], true)];
        let matrix = TransitionMatrix::from_paths(&conversions, &[], ChannelGrouping::Source);
        assert_eq!(matrix.states(), ["start", "conversion", "null"]);
        assert_abs_diff_eq!(matrix.probability("start", "conversion").unwrap(), 1.0);
    }

    #[test]
    fn test_without_redirects_to_null() {
        let conversions = [path("c1", &["google", "email"], true)];
        let non_conversions = [path("n1", &["email"], false)];
        let matrix = TransitionMatrix::from_paths(&conversions, &non_conversions, ChannelGrouping::Source);
        let reduced = matrix.without("google").unwrap();

        assert_abs_diff_eq!(reduced.probability("start", "google").unwrap(), 0.0);
        assert_abs_diff_eq!(reduced.probability("start", "null").unwrap(), 0.5);
        assert_abs_diff_eq!(reduced.probability("google", "null").unwrap(), 1.0);
        assert_abs_diff_eq!(reduced.probability("google", "email").unwrap(), 0.0);

        assert!(matrix.without("start").is_err());
        assert!(matrix.without("conversion").is_err());
        assert!(matrix.without("bing").is_err());
    }

    #[test]
    fn test_from_probabilities_checks_shape() {
        let result = TransitionMatrix::from_probabilities(vec!["a".to_string()], Array2::zeros((3, 3)));
        assert!(matches!(result, Err(MarkovError::DimensionMismatch { expected: 4, .. })));
    }
}
