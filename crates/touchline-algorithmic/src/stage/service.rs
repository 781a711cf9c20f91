//! Cached stage analysis over a transition source.

use super::heuristic::heuristic_analysis;
use super::{AnalysisQuality, StageAnalysis, StageError, StageRemovalEffect, StageServiceConfig};
use crate::markov::{MarkovModel, TransitionMatrix};
use chrono::{Duration, NaiveDate, Utc};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use touchline_data::{AnalysisCache, CONVERSION_STAGE, FunnelStage, StageTransition, TransitionSource};
use tracing::{debug, info, warn};

/// Transition matrix over `stages` from aggregated rows.
///
/// `start` moves entirely to the first stage. Each stage moves to its observed
/// targets at their rates (rescaled when they add up to more than 1) and the
/// rest drops off to `null`. Rows naming unknown stages are skipped.
pub fn build_stage_matrix(
    stages: &[FunnelStage],
    transitions: &[StageTransition],
) -> Result<TransitionMatrix, StageError> {
    let ids: Vec<String> = stages.iter().map(|s| s.id.clone()).collect();
    let n = ids.len() + 3;
    let index: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i + 1))
        .collect();
    let conversion = n - 2;
    let null = n - 1;

    let mut probabilities = Array2::<f64>::zeros((n, n));
    if !ids.is_empty() {
        probabilities[[0, 1]] = 1.0;
    }

    for row in transitions {
        let Some(&from) = index.get(row.from_stage.as_str()) else {
            debug!(from = %row.from_stage, "Skipping transition from unknown stage");
            continue;
        };
        let to = if row.is_conversion() {
            conversion
        } else if let Some(&to) = index.get(row.to_stage.as_str()) {
            to
        } else {
            debug!(to = %row.to_stage, "Skipping transition to unknown stage");
            continue;
        };
        let rate = if row.transition_rate.is_finite() {
            row.transition_rate.max(0.0)
        } else {
            0.0
        };
        probabilities[[from, to]] += rate;
    }

    for from in 1..conversion {
        let mut row = probabilities.row_mut(from);
        let total: f64 = row.sum();
        if total > 1.0 {
            row /= total;
        } else {
            row[null] = 1.0 - total;
        }
    }

    Ok(TransitionMatrix::from_probabilities(ids, probabilities)?)
}

/// Visitors observed across the funnel.
///
/// Every row from a stage repeats that stage's visitor count, so each
/// from-stage contributes its largest count once.
pub fn total_visitors(transitions: &[StageTransition]) -> u64 {
    let mut per_stage: BTreeMap<&str, u64> = BTreeMap::new();
    for row in transitions {
        let entry = per_stage.entry(row.from_stage.as_str()).or_default();
        *entry = (*entry).max(row.visitors);
    }
    per_stage.values().sum()
}

/// Stage importance service with a TTL cache in front of the analysis.
///
/// Concurrent misses for the same key are not coalesced; each recomputes and
/// the last write wins.
pub struct StageMarkovService<'a> {
    source: &'a dyn TransitionSource,
    cache: &'a dyn AnalysisCache,
    config: StageServiceConfig,
    model: MarkovModel,
}

impl fmt::Debug for StageMarkovService<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageMarkovService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> StageMarkovService<'a> {
    /// Create a service with a validated configuration.
    pub fn new(
        source: &'a dyn TransitionSource,
        cache: &'a dyn AnalysisCache,
        config: StageServiceConfig,
    ) -> Result<Self, StageError> {
        config.validate()?;
        let model = MarkovModel::new(config.markov.clone())?;
        Ok(Self {
            source,
            cache,
            config,
            model,
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &StageServiceConfig {
        &self.config
    }

    /// Cache key for an organization and period.
    pub fn cache_key(org_id: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!("stage-markov:{org_id}:{start}:{end}")
    }

    /// Cached analysis when live, otherwise a fresh one that is then cached.
    ///
    /// Cache failures are logged and never fail the analysis.
    pub fn analyze(
        &self,
        org_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StageAnalysis, StageError> {
        let key = Self::cache_key(org_id, start, end);

        match self.cache.get(&key) {
            Ok(Some(json)) => match serde_json::from_str::<StageAnalysis>(&json) {
                Ok(analysis) => {
                    debug!(key = %key, "Stage analysis cache hit");
                    return Ok(analysis);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable cached analysis"),
            },
            Ok(None) => debug!(key = %key, "Stage analysis cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Stage analysis cache read failed"),
        }

        let analysis = self.analyze_uncached(org_id, start, end)?;

        let json = serde_json::to_string(&analysis)?;
        let ttl = Duration::seconds(self.config.cache_ttl_seconds);
        if let Err(e) = self.cache.put(&key, &json, ttl) {
            warn!(key = %key, error = %e, "Stage analysis cache write failed");
        }

        Ok(analysis)
    }

    /// Compute an analysis without touching the cache.
    pub fn analyze_uncached(
        &self,
        org_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<StageAnalysis, StageError> {
        let mut stages = self.source.stages(org_id)?;
        stages.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
        let transitions = self.source.transitions(org_id, start, end)?;

        let known = |id: &str| id == CONVERSION_STAGE || stages.iter().any(|s| s.id == id);
        let usable: Vec<StageTransition> = transitions
            .into_iter()
            .filter(|t| known(&t.from_stage) && known(&t.to_stage) && t.visitors > 0)
            .collect();

        if usable.is_empty() {
            info!(
                org_id,
                stages = stages.len(),
                "No stage transitions for period; using position heuristic"
            );
            return Ok(heuristic_analysis(
                org_id,
                start,
                end,
                &stages,
                self.config.critical_threshold,
            ));
        }

        let matrix = build_stage_matrix(&stages, &usable)?;
        let mut rng = self
            .config
            .markov
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let markov = self.model.analyze_matrix(&matrix, &mut rng);

        let by_stage: HashMap<&str, (f64, f64)> = markov
            .results
            .iter()
            .map(|r| (r.channel.as_str(), (r.removal_effect, r.attributed_credit)))
            .collect();

        let effects = stages
            .iter()
            .map(|stage| {
                let (removal_effect, attributed_credit) =
                    by_stage.get(stage.id.as_str()).copied().unwrap_or((0.0, 0.0));
                StageRemovalEffect {
                    stage_id: stage.id.clone(),
                    name: stage.name.clone(),
                    ordinal: stage.ordinal,
                    removal_effect,
                    attributed_credit,
                    is_critical: removal_effect > self.config.critical_threshold,
                }
            })
            .collect();

        let total_visitors = total_visitors(&usable);
        let quality = AnalysisQuality::from_visitors(total_visitors);
        debug!(
            org_id,
            stages = stages.len(),
            total_visitors,
            %quality,
            baseline = markov.baseline_conversion_rate,
            "Computed stage removal effects"
        );

        Ok(StageAnalysis {
            org_id: org_id.to_string(),
            period_start: start,
            period_end: end,
            stages: effects,
            baseline_conversion_probability: markov.baseline_conversion_rate,
            total_visitors,
            quality,
            used_fallback: false,
            computed_at: Utc::now(),
        })
    }

    /// Drop the cached analysis for an organization and period.
    pub fn invalidate(&self, org_id: &str, start: NaiveDate, end: NaiveDate) -> Result<(), StageError> {
        self.cache.invalidate(&Self::cache_key(org_id, start, end))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn stages() -> Vec<FunnelStage> {
        vec![
            FunnelStage::new("visit", "Visit", 1),
            FunnelStage::new("cart", "Cart", 2),
        ]
    }

    #[test]
    fn test_matrix_rows() {
        let transitions = vec![
            StageTransition::new("visit", "cart", 1_000, 400),
            StageTransition::new("cart", CONVERSION_STAGE, 400, 100),
        ];
        let matrix = build_stage_matrix(&stages(), &transitions).unwrap();

        assert_eq!(matrix.states(), ["start", "visit", "cart", "conversion", "null"]);
        assert_abs_diff_eq!(matrix.probability("start", "visit").unwrap(), 1.0);
        assert_abs_diff_eq!(matrix.probability("visit", "cart").unwrap(), 0.4);
        assert_abs_diff_eq!(matrix.probability("visit", "null").unwrap(), 0.6);
        assert_abs_diff_eq!(matrix.probability("cart", "conversion").unwrap(), 0.25);
        assert_abs_diff_eq!(matrix.probability("cart", "null").unwrap(), 0.75);
    }

    #[test]
    fn test_rates_above_one_are_rescaled() {
        let transitions = vec![
            StageTransition::new("visit", "cart", 10, 9),
            StageTransition::new("visit", CONVERSION_STAGE, 10, 3),
        ];
        let matrix = build_stage_matrix(&stages(), &transitions).unwrap();
        assert_abs_diff_eq!(matrix.probability("visit", "cart").unwrap(), 0.75);
        assert_abs_diff_eq!(matrix.probability("visit", "conversion").unwrap(), 0.25);
        assert_abs_diff_eq!(matrix.probability("visit", "null").unwrap(), 0.0);
        // cart has no rows and drops off entirely
        assert_abs_diff_eq!(matrix.probability("cart", "null").unwrap(), 1.0);
    }

    #[test]
    fn test_total_visitors_counts_each_stage_once() {
        let transitions = vec![
            StageTransition::new("visit", "cart", 500, 200),
            StageTransition::new("visit", CONVERSION_STAGE, 500, 10),
            StageTransition::new("cart", CONVERSION_STAGE, 200, 50),
        ];
        assert_eq!(total_visitors(&transitions), 700);
    }
}
