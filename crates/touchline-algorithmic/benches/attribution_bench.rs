//! Benchmarks for the graph-based attribution models

use chrono::{TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use touchline_algorithmic::{
    AbsorptionMethod, MarkovConfig, MarkovModel, ShapleyConfig, ShapleyMode, ShapleyModel,
};
use touchline_data::{EventGenerator, IdentityMap};
use touchline_models::{PathBuilder, PathSet};

fn make_paths(journeys: usize) -> PathSet {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    let events = EventGenerator::new(Some(42)).generate_journeys(journeys, start, end);
    PathBuilder::try_default()
        .unwrap()
        .build_at(&events, &IdentityMap::new(), end)
}

fn shapley_benchmarks(c: &mut Criterion) {
    let paths = make_paths(2_000);

    let exact = ShapleyModel::new(ShapleyConfig {
        mode: ShapleyMode::Exact,
        ..ShapleyConfig::default()
    })
    .unwrap();
    c.bench_function("shapley_exact_2k_journeys", |b| {
        b.iter(|| exact.analyze(black_box(&paths.conversion_paths), &paths.non_conversion_paths))
    });

    let sampled = ShapleyModel::new(ShapleyConfig {
        mode: ShapleyMode::Sampled,
        seed: Some(1),
        ..ShapleyConfig::default()
    })
    .unwrap();
    c.bench_function("shapley_sampled_1k_permutations", |b| {
        b.iter(|| sampled.analyze(black_box(&paths.conversion_paths), &paths.non_conversion_paths))
    });
}

fn markov_benchmarks(c: &mut Criterion) {
    let paths = make_paths(2_000);

    let monte_carlo = MarkovModel::new(MarkovConfig {
        seed: Some(1),
        ..MarkovConfig::default()
    })
    .unwrap();
    c.bench_function("markov_monte_carlo_10k_walks", |b| {
        b.iter(|| monte_carlo.analyze(black_box(&paths.conversion_paths), &paths.non_conversion_paths))
    });

    let analytic = MarkovModel::new(MarkovConfig {
        method: AbsorptionMethod::Analytic,
        ..MarkovConfig::default()
    })
    .unwrap();
    c.bench_function("markov_analytic", |b| {
        b.iter(|| analytic.analyze(black_box(&paths.conversion_paths), &paths.non_conversion_paths))
    });
}

criterion_group!(benches, shapley_benchmarks, markov_benchmarks);
criterion_main!(benches);
