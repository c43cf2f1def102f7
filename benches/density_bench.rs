use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use habitat_scorer_rust::config::{BandwidthMode, SuitabilityConfig};
use habitat_scorer_rust::{CancellationToken, FeatureTable, SuitabilityEngine};

const COVARIATES: usize = 4;

fn table(rng: &mut StdRng, n: usize, centre: f64) -> FeatureTable {
    let names = (0..COVARIATES).map(|j| format!("bio{}", j + 1)).collect();
    let rows = (0..n)
        .map(|_| {
            (0..COVARIATES)
                .map(|_| centre + rng.gen_range(-1.0..1.0))
                .collect()
        })
        .collect();
    FeatureTable::from_rows(names, rows).unwrap()
}

fn fitted(config: SuitabilityConfig, n_presence: usize, n_background: usize) -> SuitabilityEngine {
    let mut rng = StdRng::seed_from_u64(7);
    let presence = table(&mut rng, n_presence, 1.0);
    let background = table(&mut rng, n_background, 0.0);
    let mut engine = SuitabilityEngine::new(config).unwrap();
    engine.fit(presence, background).unwrap();
    engine
}

fn bench_predict_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_point");
    for n in [200usize, 2_000, 10_000] {
        let engine = fitted(SuitabilityConfig::default(), n / 10, n);
        let point = [0.5; COVARIATES];
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| engine.predict("site_a", black_box(&point)).unwrap())
        });
    }
    group.finish();
}

fn bench_project_grid(c: &mut Criterion) {
    let engine = fitted(SuitabilityConfig::default(), 200, 2_000);
    let grid = table(&mut StdRng::seed_from_u64(11), 20_000, 0.5);
    let token = CancellationToken::new();
    c.bench_function("project_20k_grid", |b| {
        b.iter(|| engine.project(black_box(&grid), &token).unwrap())
    });
}

fn bench_cross_validated_fit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let presence = table(&mut rng, 100, 1.0);
    let background = table(&mut rng, 1_000, 0.0);
    let config = SuitabilityConfig {
        bandwidth_mode: BandwidthMode::CrossValidated,
        ..Default::default()
    };
    c.bench_function("fit_cross_validated_1k", |b| {
        b.iter(|| {
            let mut engine = SuitabilityEngine::new(config.clone()).unwrap();
            engine
                .fit(black_box(presence.clone()), black_box(background.clone()))
                .unwrap();
            engine
        })
    });
}

criterion_group!(
    benches,
    bench_predict_point,
    bench_project_grid,
    bench_cross_validated_fit
);
criterion_main!(benches);
