//! Position-only stage estimate for periods without transition data.

use super::{AnalysisQuality, StageAnalysis, StageRemovalEffect};
use crate::credits::normalize_scores;
use chrono::{NaiveDate, Utc};
use touchline_data::FunnelStage;

/// Estimated removal effect of the stage at `index` in a funnel of `count`.
///
/// Earlier stages matter more: `(count - 1 - index) / (count - 1) * 0.5`,
/// falling from 0.5 at the entry to 0 at the last stage. A single stage gets 0.5.
pub fn heuristic_effect(index: usize, count: usize) -> f64 {
    if count <= 1 {
        return 0.5;
    }
    let remaining = count.saturating_sub(index + 1) as f64;
    remaining / (count - 1) as f64 * 0.5
}

/// Low-quality analysis from stage positions alone.
///
/// `stages` must already be in ordinal order.
pub fn heuristic_analysis(
    org_id: &str,
    period_start: NaiveDate,
    period_end: NaiveDate,
    stages: &[FunnelStage],
    critical_threshold: f64,
) -> StageAnalysis {
    let effects: Vec<f64> = (0..stages.len())
        .map(|i| heuristic_effect(i, stages.len()))
        .collect();
    let credits = normalize_scores(
        stages
            .iter()
            .zip(&effects)
            .map(|(stage, &effect)| (stage.id.clone(), effect)),
    );

    let stages = stages
        .iter()
        .zip(effects)
        .map(|(stage, removal_effect)| StageRemovalEffect {
            stage_id: stage.id.clone(),
            name: stage.name.clone(),
            ordinal: stage.ordinal,
            removal_effect,
            attributed_credit: credits.get(&stage.id).copied().unwrap_or(0.0),
            is_critical: removal_effect > critical_threshold,
        })
        .collect();

    StageAnalysis {
        org_id: org_id.to_string(),
        period_start,
        period_end,
        stages,
        baseline_conversion_probability: 0.0,
        total_visitors: 0,
        quality: AnalysisQuality::Low,
        used_fallback: true,
        computed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1, 0.5)]
    #[case(0, 3, 0.5)]
    #[case(1, 3, 0.25)]
    #[case(2, 3, 0.0)]
    #[case(1, 5, 0.375)]
    fn test_heuristic_effect(#[case] index: usize, #[case] count: usize, #[case] expected: f64) {
        assert_abs_diff_eq!(heuristic_effect(index, count), expected);
    }

    #[test]
    fn test_heuristic_analysis() {
        let stages = vec![
            FunnelStage::new("visit", "Visit", 1),
            FunnelStage::new("signup", "Signup", 2),
            FunnelStage::new("checkout", "Checkout", 3),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let analysis = heuristic_analysis("org", day, day, &stages, 0.3);

        assert!(analysis.used_fallback);
        assert_eq!(analysis.quality, AnalysisQuality::Low);
        assert_eq!(analysis.stages.len(), 3);
        assert!(analysis.stages[0].is_critical);
        assert!(!analysis.stages[1].is_critical);
        assert_abs_diff_eq!(analysis.stages[0].attributed_credit, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(analysis.stages[2].attributed_credit, 0.0);
    }
}
