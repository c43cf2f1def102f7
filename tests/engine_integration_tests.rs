//! End-to-end tests for the suitability engine
//!
//! Run with: cargo test --test engine_integration_tests

use approx::assert_relative_eq;
use habitat_scorer_rust::config::{BandwidthMode, FixedBandwidth, KernelKind, ScalingMode};
use habitat_scorer_rust::evaluation;
use habitat_scorer_rust::{
    CancellationToken, EngineStage, FeatureTable, Label, NormalizationMode, ScoredSample,
    SuitabilityConfig, SuitabilityEngine, SuitabilityError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn names(dim: usize) -> Vec<String> {
    (0..dim).map(|j| format!("bio{}", j + 1)).collect()
}

fn table(rows: Vec<Vec<f64>>) -> FeatureTable {
    let dim = rows[0].len();
    FeatureTable::from_rows(names(dim), rows).unwrap()
}

fn uniform(rng: &mut StdRng, n: usize, dim: usize, lo: f64, hi: f64) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(lo..hi)).collect())
        .collect()
}

fn scenario() -> (FeatureTable, FeatureTable) {
    let presence = table(vec![
        vec![10.0, 10.0],
        vec![11.0, 11.0],
        vec![10.0, 11.0],
    ]);
    let background = table(vec![
        vec![0.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
    ]);
    (presence, background)
}

// ============================================================================
// Worked scenario
// ============================================================================

#[test]
fn test_separated_clusters_score_high_auc() {
    let config = SuitabilityConfig {
        bandwidth_mode: BandwidthMode::RuleOfThumb,
        min_samples_per_class: Some(3),
        ..Default::default()
    };
    let mut engine = SuitabilityEngine::new(config).unwrap();
    let (presence, background) = scenario();

    let result = engine.run(presence, background).unwrap();
    assert!(result.auc > 0.9, "auc = {}", result.auc);
    assert_eq!(result.n_presence, 3);
    assert_eq!(result.n_background, 4);
    assert_eq!(engine.stage(), EngineStage::Evaluated);
}

#[test]
fn test_default_minimum_rejects_three_presence_points() {
    let mut engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
    let (presence, background) = scenario();
    assert_eq!(
        engine.run(presence, background).unwrap_err(),
        SuitabilityError::InsufficientSample {
            class: Some(Label::Presence),
            count: 3,
            required: 4
        }
    );
}

#[test]
fn test_three_dimensional_query_on_two_dimensional_model() {
    let config = SuitabilityConfig {
        min_samples_per_class: Some(3),
        ..Default::default()
    };
    let mut engine = SuitabilityEngine::new(config).unwrap();
    let (presence, background) = scenario();
    engine.fit(presence, background).unwrap();

    assert_eq!(
        engine.predict("site_a", &[10.0, 10.0, 10.0]).unwrap_err(),
        SuitabilityError::DimensionMismatch {
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn test_predict_before_fit_fails() {
    let engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
    assert!(matches!(
        engine.predict("site_a", &[0.0, 0.0]),
        Err(SuitabilityError::ModelNotFitted(_))
    ));
    assert!(matches!(
        engine.project(&scenario().0, &CancellationToken::new()),
        Err(SuitabilityError::ModelNotFitted(_))
    ));
}

// ============================================================================
// Discrimination properties
// ============================================================================

#[test]
fn test_disjoint_ranges_give_perfect_auc() {
    let mut rng = StdRng::seed_from_u64(1);
    let presence = table(uniform(&mut rng, 30, 3, 10.0, 12.0));
    let background = table(uniform(&mut rng, 60, 3, 0.0, 2.0));

    let mut engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
    let result = engine.run(presence, background).unwrap();
    assert_relative_eq!(result.auc, 1.0);
}

#[test]
fn test_identical_distributions_average_half() {
    let repeats = 30;
    let mut total = 0.0;

    for seed in 0..repeats {
        let mut rng = StdRng::seed_from_u64(100 + seed);
        let presence = table(uniform(&mut rng, 80, 2, 0.0, 1.0));
        let background = table(uniform(&mut rng, 80, 2, 0.0, 1.0));

        let mut engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
        engine.fit(presence, background).unwrap();

        // Fresh draws from the same distribution for both labels
        let mut held_out = Vec::new();
        for (label, rows) in [
            (Label::Presence, uniform(&mut rng, 50, 2, 0.0, 1.0)),
            (Label::Background, uniform(&mut rng, 50, 2, 0.0, 1.0)),
        ] {
            for row in rows {
                let score = engine.predict("held_out", &row).unwrap();
                held_out.push(ScoredSample::new(score.raw, label));
            }
        }
        total += evaluation::auc(&held_out).unwrap();
    }

    let mean = total / repeats as f64;
    assert!((mean - 0.5).abs() < 0.06, "mean auc = {}", mean);
}

#[test]
fn test_refit_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(9);
    let presence = table(uniform(&mut rng, 40, 2, 0.0, 3.0));
    let background = table(uniform(&mut rng, 80, 2, -2.0, 2.0));

    for mode in [BandwidthMode::RuleOfThumb, BandwidthMode::CrossValidated] {
        let config = SuitabilityConfig {
            bandwidth_mode: mode,
            ..Default::default()
        };
        let mut engine = SuitabilityEngine::new(config).unwrap();
        let first = engine.run(presence.clone(), background.clone()).unwrap();
        let second = engine.run(presence.clone(), background.clone()).unwrap();
        assert_relative_eq!(first.auc, second.auc, epsilon = 1e-12);
    }
}

// ============================================================================
// Score ranges and normalization
// ============================================================================

#[test]
fn test_raw_ratios_stay_below_one() {
    let mut rng = StdRng::seed_from_u64(21);
    let presence = table(uniform(&mut rng, 20, 2, 5.0, 6.0));
    let background = table(uniform(&mut rng, 20, 2, 0.0, 1.0));

    // Narrow kernels push presence ratios toward saturation
    let config = SuitabilityConfig {
        bandwidth_mode: BandwidthMode::Fixed,
        fixed_bandwidth: Some(FixedBandwidth::Scalar(0.01)),
        epsilon: 0.0,
        ..Default::default()
    };
    let mut engine = SuitabilityEngine::new(config).unwrap();
    engine.fit(presence, background).unwrap();

    for s in engine.score_training().unwrap() {
        assert!((0.0..1.0).contains(&s.score), "raw = {}", s.score);
    }
    let far = engine.predict("far", &[1e4, -1e4]).unwrap();
    assert!((0.0..1.0).contains(&far.raw));
}

#[test]
fn test_min_max_preserves_rank_order() {
    let mut rng = StdRng::seed_from_u64(5);
    let presence = table(uniform(&mut rng, 30, 2, 1.0, 3.0));
    let background = table(uniform(&mut rng, 60, 2, 0.0, 4.0));
    let grid = table(uniform(&mut rng, 500, 2, -1.0, 5.0));

    let mut engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
    engine.fit(presence, background).unwrap();
    let scored = engine.project(&grid, &CancellationToken::new()).unwrap();

    let mut by_raw: Vec<_> = scored.scores().to_vec();
    by_raw.sort_by(|a, b| a.raw.partial_cmp(&b.raw).unwrap());
    for pair in by_raw.windows(2) {
        assert!(pair[0].normalized <= pair[1].normalized);
    }
    assert!(scored
        .scores()
        .iter()
        .all(|s| (0.0..=1.0).contains(&s.normalized)));
}

#[test]
fn test_normalization_leaves_auc_unchanged() {
    let mut rng = StdRng::seed_from_u64(13);
    let presence = table(uniform(&mut rng, 30, 2, 0.5, 2.0));
    let background = table(uniform(&mut rng, 60, 2, 0.0, 3.0));

    let mut aucs = Vec::new();
    for mode in [
        NormalizationMode::None,
        NormalizationMode::MinMax,
        NormalizationMode::Percentile,
    ] {
        let config = SuitabilityConfig {
            normalization_mode: mode,
            ..Default::default()
        };
        let mut engine = SuitabilityEngine::new(config).unwrap();
        aucs.push(engine.run(presence.clone(), background.clone()).unwrap().auc);
    }
    assert_relative_eq!(aucs[0], aucs[1]);
    assert_relative_eq!(aucs[0], aucs[2]);
}

// ============================================================================
// Alternative strategies
// ============================================================================

#[test]
fn test_alternative_kernels_and_scaling_separate_clusters() {
    let mut rng = StdRng::seed_from_u64(17);
    let presence = table(uniform(&mut rng, 25, 2, 8.0, 10.0));
    let background = table(uniform(&mut rng, 50, 2, 0.0, 6.0));

    let configs = [
        SuitabilityConfig {
            kernel: KernelKind::Epanechnikov,
            ..Default::default()
        },
        SuitabilityConfig {
            scaling: ScalingMode::Robust,
            ..Default::default()
        },
        SuitabilityConfig {
            bandwidth_mode: BandwidthMode::CrossValidated,
            ..Default::default()
        },
    ];
    for config in configs {
        let mut engine = SuitabilityEngine::new(config.clone()).unwrap();
        let result = engine.run(presence.clone(), background.clone()).unwrap();
        assert!(result.auc > 0.95, "{:?}: auc = {}", config, result.auc);
    }
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn test_cancelled_projection_returns_no_grid() {
    let mut rng = StdRng::seed_from_u64(2);
    let config = SuitabilityConfig {
        batch_size: 10,
        workers: Some(2),
        ..Default::default()
    };
    let mut engine = SuitabilityEngine::new(config).unwrap();
    engine
        .fit(
            table(uniform(&mut rng, 20, 2, 1.0, 2.0)),
            table(uniform(&mut rng, 20, 2, 0.0, 3.0)),
        )
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let grid = table(uniform(&mut rng, 100, 2, 0.0, 3.0));
    assert!(matches!(
        engine.project(&grid, &token),
        Err(SuitabilityError::Cancelled { total: 10, .. })
    ));
}

#[test]
fn test_projection_round_trips_through_csv() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut engine = SuitabilityEngine::new(SuitabilityConfig::default()).unwrap();
    engine
        .fit(
            table(uniform(&mut rng, 20, 2, 1.0, 2.0)),
            table(uniform(&mut rng, 40, 2, 0.0, 3.0)),
        )
        .unwrap();

    let grid = table(uniform(&mut rng, 25, 2, 0.0, 3.0));
    let scored = engine.project(&grid, &CancellationToken::new()).unwrap();
    let map = scored.to_map();
    assert_eq!(map.len(), 25);

    let path = std::env::temp_dir().join(format!("habitat_scores_{}.csv", std::process::id()));
    scored.write_csv(&path).unwrap();
    let written = FeatureTable::from_csv(&path, "id").unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(written.covariates(), &["raw".to_string(), "suitability".to_string()]);
    assert_eq!(written.len(), 25);
    for (idx, id) in written.ids().iter().enumerate() {
        assert_relative_eq!(written.row(idx)[1], map[id], epsilon = 1e-9);
    }
}
