//! Normalization Utilities
//!
//! Rescales raw suitability ratios to [0, 1] for output. Raw ratios are never
//! overwritten: evaluation always runs on raw values, and a fitted
//! [`Normalizer`] can be reapplied to later predictions.
//!
//! Modes:
//! - `None`: identity (raw ratios are already in [0, 1))
//! - `MinMax`: `(r − min) / (max − min)`, strictly order-preserving
//! - `Percentile`: empirical CDF via linear interpolation between percentile
//!   knots, monotone non-decreasing

use crate::config::NormalizationMode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Percentile knots 0, 1, ..., 100
const N_KNOTS: usize = 101;

/// Fitted rescaling of raw ratios to [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Normalizer {
    Identity,
    MinMax { min: f64, max: f64 },
    /// Reference values at percentiles 0..=100
    Percentile { knots: Vec<f64> },
}

impl Normalizer {
    /// Fit on a reference set of raw ratios
    ///
    /// An empty reference yields the identity.
    pub fn fit(mode: NormalizationMode, reference: &[f64]) -> Self {
        if reference.is_empty() {
            return Normalizer::Identity;
        }
        match mode {
            NormalizationMode::None => Normalizer::Identity,
            NormalizationMode::MinMax => {
                let min = reference.iter().copied().fold(f64::INFINITY, f64::min);
                let max = reference.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Normalizer::MinMax { min, max }
            }
            NormalizationMode::Percentile => Normalizer::Percentile {
                knots: percentile_knots(reference),
            },
        }
    }

    /// Map one raw ratio to [0, 1]
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Normalizer::Identity => raw.clamp(0.0, 1.0),
            Normalizer::MinMax { min, max } => {
                let range = max - min;
                if range <= 0.0 {
                    // Constant reference carries no ranking information
                    0.5
                } else {
                    ((raw - min) / range).clamp(0.0, 1.0)
                }
            }
            Normalizer::Percentile { knots } => interpolate_percentile(raw, knots),
        }
    }

    pub fn apply_all(&self, raws: &[f64]) -> Vec<f64> {
        raws.iter().map(|&r| self.apply(r)).collect()
    }
}

/// Min-max normalize a set of values against itself
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    Normalizer::fit(NormalizationMode::MinMax, values).apply_all(values)
}

/// Percentile normalize a set of values against itself
pub fn percentile_normalize(values: &[f64]) -> Vec<f64> {
    Normalizer::fit(NormalizationMode::Percentile, values).apply_all(values)
}

/// Reference values at percentiles 0..=100 (linear interpolation between order statistics)
fn percentile_knots(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let last = (sorted.len() - 1) as f64;

    (0..N_KNOTS)
        .map(|p| {
            let pos = p as f64 / 100.0 * last;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        })
        .collect()
}

/// Percentile (as a fraction) of `raw` among the knots
///
/// 1. Find bracketing knots `[k_i, k_{i+1}]` with `k_i <= raw <= k_{i+1}`
/// 2. Interpolate: `(i + fraction) / 100`
fn interpolate_percentile(raw: f64, knots: &[f64]) -> f64 {
    let last = knots.len() - 1;
    if raw <= knots[0] {
        return 0.0;
    }
    if raw >= knots[last] {
        return 1.0;
    }

    // First knot strictly above raw; raw sits in [knots[i - 1], knots[i])
    let i = knots.partition_point(|k| *k <= raw);
    let (lo, hi) = (knots[i - 1], knots[i]);
    let fraction = if hi > lo { (raw - lo) / (hi - lo) } else { 0.0 };
    ((i - 1) as f64 + fraction) / last as f64
}
