//! Suitability Scorer
//!
//! Combines the presence and background densities at a point into a relative
//! suitability ratio:
//!
//! ```text
//! ratio = p / (p + b + ε)
//! ```
//!
//! The ratio is computed from log densities so it stays defined when both
//! densities underflow. It lies in [0, 1) and is a ranking, not a calibrated
//! probability.

use crate::config::NormalizationMode;
use crate::density::kernel::log_sum_exp;
use crate::density::DensityPair;
use crate::error::{check_dimension, SuitabilityError, SuitabilityResult};
use crate::preprocess::FeatureTransform;
use crate::utils::normalization::Normalizer;
use rayon::prelude::*;

/// Largest f64 strictly below 1
pub const MAX_RATIO: f64 = 1.0 - f64::EPSILON / 2.0;

/// `p / (p + b + ε)` from `ln p` and `ln b`, clamped into [0, 1)
pub fn density_ratio(log_presence: f64, log_background: f64, epsilon: f64) -> f64 {
    if log_presence == f64::NEG_INFINITY {
        return 0.0;
    }
    let log_eps = if epsilon > 0.0 {
        epsilon.ln()
    } else {
        f64::NEG_INFINITY
    };
    let log_denominator = log_sum_exp([log_presence, log_background, log_eps]);
    (log_presence - log_denominator).exp().clamp(0.0, MAX_RATIO)
}

/// Fitted transform + density pair, ready to score raw feature vectors
#[derive(Debug, Clone)]
pub struct SuitabilityScorer {
    transform: FeatureTransform,
    densities: DensityPair,
    epsilon: f64,
    normalization: NormalizationMode,
}

impl SuitabilityScorer {
    pub fn new(
        transform: FeatureTransform,
        densities: DensityPair,
        epsilon: f64,
        normalization: NormalizationMode,
    ) -> SuitabilityResult<Self> {
        check_dimension(transform.dim(), densities.dim())?;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(SuitabilityError::invalid_config(format!(
                "epsilon must be a finite non-negative number, got {}",
                epsilon
            )));
        }
        Ok(Self {
            transform,
            densities,
            epsilon,
            normalization,
        })
    }

    pub fn transform(&self) -> &FeatureTransform {
        &self.transform
    }

    pub fn densities(&self) -> &DensityPair {
        &self.densities
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn normalization_mode(&self) -> NormalizationMode {
        self.normalization
    }

    pub fn dim(&self) -> usize {
        self.transform.dim()
    }

    /// Raw ratio for a point already in the preprocessed space
    pub fn score_preprocessed(&self, z: &[f64]) -> SuitabilityResult<f64> {
        let log_p = self.densities.presence.log_density(z)?;
        let log_b = self.densities.background.log_density(z)?;
        Ok(density_ratio(log_p, log_b, self.epsilon))
    }

    /// Raw ratio for a raw feature vector (stored transform applied first)
    pub fn score(&self, raw: &[f64]) -> SuitabilityResult<f64> {
        let z = self.transform.apply(raw)?;
        self.score_preprocessed(&z)
    }

    /// Raw ratios for many raw feature vectors, in input order
    pub fn score_batch(&self, rows: &[Vec<f64>]) -> SuitabilityResult<Vec<f64>> {
        rows.par_iter().map(|row| self.score(row)).collect()
    }

    /// Normalizer of the configured mode fitted on `reference` raw ratios
    pub fn normalizer(&self, reference: &[f64]) -> Normalizer {
        Normalizer::fit(self.normalization, reference)
    }
}
