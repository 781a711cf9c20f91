//! Integration tests: generated journeys through the graph-based models and
//! funnel stages through the cached stage service

use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rstest::rstest;
use touchline_algorithmic::{
    AnalysisQuality, MarkovConfig, MarkovModel, ShapleyConfig, ShapleyMode, ShapleyModel,
    StageMarkovService, StageServiceConfig, apply_channel_credits, data_driven_lift,
};
use touchline_data::{
    AnalysisCache, CONVERSION_STAGE, ChannelGrouping, EventGenerator, FunnelStage, IdentityMap,
    InMemoryFunnel, MemoryCache, SqliteCache, StageTransition,
};
use touchline_models::{PathBuilder, PathSet};

fn generated_paths(seed: u64) -> PathSet {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut generator = EventGenerator::new(Some(seed));
    let events = generator.generate_journeys(300, start, end);
    PathBuilder::try_default()
        .unwrap()
        .build_at(&events, &IdentityMap::new(), end)
}

#[rstest]
#[case(ShapleyMode::Exact)]
#[case(ShapleyMode::Sampled)]
fn test_shapley_credits_sum_to_one(#[case] mode: ShapleyMode) {
    let paths = generated_paths(7);
    let model = ShapleyModel::new(ShapleyConfig {
        mode,
        samples: 500,
        seed: Some(3),
        ..ShapleyConfig::default()
    })
    .unwrap();

    let analysis = model.analyze(&paths.conversion_paths, &paths.non_conversion_paths);
    assert!(!analysis.results.is_empty());
    let total: f64 = analysis.results.iter().map(|r| r.attributed_credit).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
    assert!(analysis.results.iter().all(|r| r.attributed_credit >= 0.0));
}

#[test]
fn test_markov_matrix_and_removal_effects() {
    let paths = generated_paths(11);
    let model = MarkovModel::new(MarkovConfig {
        seed: Some(1),
        walks: 2_000,
        ..MarkovConfig::default()
    })
    .unwrap();

    let matrix = model.build_matrix(&paths.conversion_paths, &paths.non_conversion_paths);
    let states = matrix.states();
    assert!(states.iter().any(|s| s == "start"));
    assert!(states.iter().any(|s| s == "conversion"));
    assert!(states.iter().any(|s| s == "null"));
    assert_eq!(matrix.probabilities().dim(), (matrix.dim(), matrix.dim()));

    // Every channel that ever precedes a conversion has a positive edge to it
    for path in paths.conversion_paths.iter().filter(|p| !p.is_empty()) {
        let last = path.touchpoints[path.len() - 1]
            .channel
            .label(ChannelGrouping::Source);
        assert!(matrix.probability(&last, "conversion").unwrap() > 0.0);
    }

    let analysis = model.analyze(&paths.conversion_paths, &paths.non_conversion_paths);
    for result in &analysis.results {
        assert!((0.0..=1.0).contains(&result.removal_effect));
    }
    let total: f64 = analysis.results.iter().map(|r| r.attributed_credit).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);

    // Applied credits conserve each path's value
    let credits = analysis.channel_credits();
    for path in paths.conversion_paths.iter().filter(|p| !p.is_empty()) {
        let applied = apply_channel_credits(path, &credits, ChannelGrouping::Source);
        let sum: f64 = applied.iter().map(|t| t.credit).sum();
        assert_abs_diff_eq!(sum, path.conversion_value, epsilon = 1e-5);
    }
}

#[test]
fn test_lift_credits_sum_to_one() {
    let paths = generated_paths(5);
    let results = data_driven_lift(
        &paths.conversion_paths,
        &paths.non_conversion_paths,
        ChannelGrouping::Source,
    );
    let total: f64 = results.iter().map(|r| r.attributed_credit).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    for result in &results {
        assert!((-1.0..=1.0).contains(&result.lift));
        if result.lift <= 0.0 {
            assert_eq!(result.attributed_credit, 0.0);
        }
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

fn funnel_stages() -> Vec<FunnelStage> {
    vec![
        FunnelStage::new("landing", "Landing", 1),
        FunnelStage::new("signup", "Signup", 2),
        FunnelStage::new("checkout", "Checkout", 3),
    ]
}

fn daily_rows() -> Vec<StageTransition> {
    vec![
        StageTransition::new("landing", "signup", 1_000, 300),
        StageTransition::new("signup", "checkout", 300, 150),
        StageTransition::new("checkout", CONVERSION_STAGE, 150, 60),
    ]
}

#[test]
fn test_stage_service_with_sqlite_store() {
    let store = SqliteCache::in_memory().unwrap();
    store.put_stages("acme", &funnel_stages()).unwrap();
    for d in [1, 2] {
        for row in daily_rows() {
            store.put_transition("acme", day(d), &row).unwrap();
        }
    }

    let service = StageMarkovService::new(&store, &store, StageServiceConfig::default()).unwrap();
    let analysis = service.analyze("acme", day(1), day(7)).unwrap();

    assert!(!analysis.used_fallback);
    assert_eq!(analysis.quality, AnalysisQuality::High);
    assert_eq!(analysis.total_visitors, 2_900);
    // 0.3 * 0.5 * 0.4
    assert_abs_diff_eq!(analysis.baseline_conversion_probability, 0.06, epsilon = 1e-9);

    // A serial funnel loses everything when any stage is removed
    for stage in &analysis.stages {
        assert_abs_diff_eq!(stage.removal_effect, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stage.attributed_credit, 1.0 / 3.0, epsilon = 1e-9);
        assert!(stage.is_critical);
    }
    let order: Vec<_> = analysis.stages.iter().map(|s| s.stage_id.as_str()).collect();
    assert_eq!(order, ["landing", "signup", "checkout"]);

    let key = StageMarkovService::cache_key("acme", day(1), day(7));
    assert!(store.get(&key).unwrap().is_some());
    let cached = service.analyze("acme", day(1), day(7)).unwrap();
    assert_eq!(cached.computed_at, analysis.computed_at);
    assert_eq!(cached.stages.len(), 3);

    service.invalidate("acme", day(1), day(7)).unwrap();
    assert!(store.get(&key).unwrap().is_none());
}

#[test]
fn test_stage_service_skip_path_and_cache_hit() {
    let funnel = InMemoryFunnel::new();
    funnel.put_stages("acme", funnel_stages()).unwrap();
    let rows = vec![
        StageTransition::new("landing", "signup", 80, 40),
        StageTransition::new("landing", "checkout", 80, 20),
        StageTransition::new("signup", "checkout", 40, 20),
        StageTransition::new("checkout", CONVERSION_STAGE, 40, 20),
    ];
    for row in rows {
        funnel.put_transition("acme", day(3), row).unwrap();
    }

    let cache = MemoryCache::new();
    let service = StageMarkovService::new(&funnel, &cache, StageServiceConfig::default()).unwrap();
    let analysis = service.analyze("acme", day(1), day(30)).unwrap();

    assert_eq!(analysis.quality, AnalysisQuality::Medium);
    let effect = |id: &str| {
        analysis
            .stages
            .iter()
            .find(|s| s.stage_id == id)
            .map(|s| s.removal_effect)
            .unwrap()
    };
    // landing → checkout bypasses signup for half of the converting mass
    assert_abs_diff_eq!(effect("landing"), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(effect("signup"), 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(effect("checkout"), 1.0, epsilon = 1e-9);
    assert_eq!(cache.len(), 1);

    // A second call is served from the cache even after new data arrives
    funnel
        .put_transition("acme", day(4), StageTransition::new("landing", "signup", 5_000, 10))
        .unwrap();
    let cached = service.analyze("acme", day(1), day(30)).unwrap();
    assert_eq!(cached.computed_at, analysis.computed_at);
    assert_eq!(cached.total_visitors, 160);
}

#[test]
fn test_stage_service_falls_back_without_transitions() {
    let funnel = InMemoryFunnel::new();
    funnel.put_stages("acme", funnel_stages()).unwrap();
    funnel
        .put_transition("acme", day(20), StageTransition::new("landing", "signup", 10, 5))
        .unwrap();

    let cache = MemoryCache::new();
    let service = StageMarkovService::new(&funnel, &cache, StageServiceConfig::default()).unwrap();
    let analysis = service.analyze("acme", day(1), day(7)).unwrap();

    assert!(analysis.used_fallback);
    assert_eq!(analysis.quality, AnalysisQuality::Low);
    let effects: Vec<f64> = analysis.stages.iter().map(|s| s.removal_effect).collect();
    assert_eq!(effects, [0.5, 0.25, 0.0]);
}

#[test]
fn test_expired_cache_entry_recomputes() {
    let funnel = InMemoryFunnel::new();
    funnel.put_stages("acme", funnel_stages()).unwrap();
    let cache = MemoryCache::new();
    let key = StageMarkovService::cache_key("acme", day(1), day(2));
    cache.put(&key, "{\"stale\":true}", Duration::seconds(-1)).unwrap();

    let service = StageMarkovService::new(&funnel, &cache, StageServiceConfig::default()).unwrap();
    let analysis = service.analyze("acme", day(1), day(2)).unwrap();
    assert!(analysis.used_fallback);
    assert!(cache.get(&key).unwrap().is_some());
}
