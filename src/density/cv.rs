//! Cross-validated bandwidth selection
//!
//! Candidates are the rule-of-thumb bandwidth multiplied by each configured
//! scale. Each candidate is scored by held-out log-likelihood:
//! - `folds = None`: leave-one-out (deterministic)
//! - `folds = Some(k)`: k-fold over a seeded shuffle of the points
//!
//! The highest score wins; ties go to the smaller scale. Candidates are scored
//! in parallel.

use crate::config::{KernelKind, SuitabilityConfig};
use crate::density::bandwidth::Bandwidths;
use crate::density::kernel::log_sum_exp;
use crate::density::scaled_r2;
use crate::error::SuitabilityResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Held-out score of one candidate scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvScore {
    pub scale: f64,
    pub log_likelihood: f64,
}

/// Pick the best multiple of `anchor` for a flat row-major sample
pub fn select_scale(
    points: &[f64],
    dim: usize,
    anchor: &Bandwidths,
    config: &SuitabilityConfig,
) -> SuitabilityResult<Bandwidths> {
    let cv = &config.cross_validation;
    let n = points.len() / dim.max(1);
    let fold_of = assign_folds(n, cv.folds, cv.seed);

    let scores = score_scales(points, dim, anchor, &cv.scales, &fold_of, config.kernel);
    for s in &scores {
        debug!("CV scale {:.3}: held-out log-likelihood {:.4}", s.scale, s.log_likelihood);
    }

    let best = best_scale(&scores);
    debug!("CV selected scale {:.3}", best);
    Ok(anchor.iter().map(|h| h * best).collect())
}

/// Fold id per point: identity for LOO, round-robin over a seeded shuffle for k-fold
pub fn assign_folds(n: usize, folds: Option<usize>, seed: u64) -> Vec<usize> {
    match folds {
        None => (0..n).collect(),
        Some(k) => {
            let k = k.clamp(1, n.max(1));
            let mut order: Vec<usize> = (0..n).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            order.shuffle(&mut rng);

            let mut fold_of = vec![0; n];
            for (pos, idx) in order.into_iter().enumerate() {
                fold_of[idx] = pos % k;
            }
            fold_of
        }
    }
}

/// Held-out log-likelihood for every candidate scale, sorted by scale
pub fn score_scales(
    points: &[f64],
    dim: usize,
    anchor: &Bandwidths,
    scales: &[f64],
    fold_of: &[usize],
    kernel: KernelKind,
) -> Vec<CvScore> {
    let mut sorted = scales.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted.dedup();

    sorted
        .par_iter()
        .map(|&scale| {
            let h: Bandwidths = anchor.iter().map(|w| w * scale).collect();
            CvScore {
                scale,
                log_likelihood: held_out_log_likelihood(points, dim, &h, fold_of, kernel),
            }
        })
        .collect()
}

/// Σ_i log f̂_{−fold(i)}(x_i)
fn held_out_log_likelihood(
    points: &[f64],
    dim: usize,
    h: &Bandwidths,
    fold_of: &[usize],
    kernel: KernelKind,
) -> f64 {
    let n = fold_of.len();
    let mut fold_sizes = vec![0usize; fold_of.iter().max().map_or(0, |m| m + 1)];
    for &f in fold_of {
        fold_sizes[f] += 1;
    }
    let log_h_sum: f64 = h.iter().map(|w| w.ln()).sum();
    let rows: Vec<&[f64]> = points.chunks_exact(dim.max(1)).collect();

    let mut total = 0.0;
    for (i, x) in rows.iter().enumerate() {
        let n_train = n - fold_sizes[fold_of[i]];
        if n_train == 0 {
            return f64::NEG_INFINITY;
        }
        let lse = log_sum_exp(
            rows.iter()
                .enumerate()
                .filter(|(j, _)| fold_of[*j] != fold_of[i])
                .map(|(_, xj)| kernel.log_weight(scaled_r2(x, xj, h), dim)),
        );
        total += lse - (n_train as f64).ln() - log_h_sum;
    }
    total
}

/// Highest log-likelihood; ties to the smaller scale
///
/// When no candidate gives every held-out point positive density (possible
/// with compact kernels), the widest candidate is used.
fn best_scale(scores: &[CvScore]) -> f64 {
    let finite = scores.iter().filter(|s| s.log_likelihood.is_finite());
    let best = finite.fold(None::<CvScore>, |best, s| match best {
        Some(b) if b.log_likelihood >= s.log_likelihood => Some(b),
        _ => Some(*s),
    });

    match best {
        Some(b) => b.scale,
        None => {
            let widest = scores.iter().map(|s| s.scale).fold(f64::NEG_INFINITY, f64::max);
            warn!(
                "No CV candidate covers every held-out point, using widest scale {:.3}",
                widest
            );
            widest
        }
    }
}
