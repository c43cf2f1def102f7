//! Engine configuration
//!
//! Loaded from a camelCase JSON file. Every field has a default, so `{}` is a
//! valid configuration (rule-of-thumb Silverman bandwidth, Gaussian kernel,
//! min-max normalization).

use crate::error::{SuitabilityError, SuitabilityResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_EPSILON: f64 = 1e-12;
pub const DEFAULT_BATCH_SIZE: usize = 4096;
pub const DEFAULT_CV_SCALES: [f64; 7] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// How kernel bandwidths are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BandwidthMode {
    #[default]
    RuleOfThumb,
    Fixed,
    CrossValidated,
}

/// Normal-reference rule used by `RuleOfThumb` (and as the CV anchor)
///
/// * Silverman: `h_j = σ_j · (4 / ((d + 2) · n))^(1 / (d + 4))`
/// * Scott:     `h_j = σ_j · n^(−1 / (d + 4))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BandwidthRule {
    #[default]
    Silverman,
    Scott,
}

/// Explicit bandwidth for `BandwidthMode::Fixed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedBandwidth {
    /// Same width in every dimension
    Scalar(f64),
    /// One width per covariate, in covariate order
    PerDimension(Vec<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KernelKind {
    #[default]
    Gaussian,
    Epanechnikov,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    None,
    #[default]
    MinMax,
    Percentile,
}

/// Per-covariate scaling fitted on the pooled presence + background sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalingMode {
    /// Mean and sample standard deviation
    #[default]
    Standardize,
    /// Median and MAD (scaled to be consistent with σ under normality)
    Robust,
}

/// Held-out log-likelihood search over multiples of the rule-of-thumb bandwidth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossValidationConfig {
    /// `None` = leave-one-out, `Some(k)` = shuffled k-fold
    pub folds: Option<usize>,
    /// Shuffle seed for k-fold
    pub seed: u64,
    /// Multipliers applied to the rule-of-thumb bandwidth
    pub scales: Vec<f64>,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            folds: None,
            seed: 42,
            scales: DEFAULT_CV_SCALES.to_vec(),
        }
    }
}

/// Full configuration surface of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuitabilityConfig {
    pub bandwidth_mode: BandwidthMode,
    pub bandwidth_rule: BandwidthRule,
    pub fixed_bandwidth: Option<FixedBandwidth>,
    pub cross_validation: CrossValidationConfig,
    pub kernel: KernelKind,
    /// Added to the denominator of the density ratio
    pub epsilon: f64,
    pub normalization_mode: NormalizationMode,
    /// Defaults to 2 × dimensionality when unset
    pub min_samples_per_class: Option<usize>,
    pub scaling: ScalingMode,
    /// Worker threads for grid projection (`None` = rayon default)
    pub workers: Option<usize>,
    /// Rows per projection batch; cancellation is checked between batches
    pub batch_size: usize,
    /// Keep ROC points in the evaluation result
    pub include_roc: bool,
}

impl Default for SuitabilityConfig {
    fn default() -> Self {
        Self {
            bandwidth_mode: BandwidthMode::default(),
            bandwidth_rule: BandwidthRule::default(),
            fixed_bandwidth: None,
            cross_validation: CrossValidationConfig::default(),
            kernel: KernelKind::default(),
            epsilon: DEFAULT_EPSILON,
            normalization_mode: NormalizationMode::default(),
            min_samples_per_class: None,
            scaling: ScalingMode::default(),
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            include_roc: true,
        }
    }
}

impl SuitabilityConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: SuitabilityConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values no fit could succeed with
    pub fn validate(&self) -> SuitabilityResult<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SuitabilityError::invalid_config(format!(
                "epsilon must be a finite non-negative number, got {}",
                self.epsilon
            )));
        }

        if self.batch_size == 0 {
            return Err(SuitabilityError::invalid_config("batchSize must be at least 1"));
        }

        if self.workers == Some(0) {
            return Err(SuitabilityError::invalid_config("workers must be at least 1"));
        }

        if self.min_samples_per_class == Some(0) {
            return Err(SuitabilityError::invalid_config(
                "minSamplesPerClass must be at least 1",
            ));
        }

        match self.bandwidth_mode {
            BandwidthMode::Fixed => {
                let widths: &[f64] = match &self.fixed_bandwidth {
                    Some(FixedBandwidth::Scalar(h)) => std::slice::from_ref(h),
                    Some(FixedBandwidth::PerDimension(hs)) => hs,
                    None => {
                        return Err(SuitabilityError::invalid_config(
                            "bandwidthMode 'fixed' requires fixedBandwidth",
                        ))
                    }
                };
                if widths.is_empty() || widths.iter().any(|h| !h.is_finite() || *h <= 0.0) {
                    return Err(SuitabilityError::invalid_config(
                        "fixedBandwidth values must be finite and positive",
                    ));
                }
            }
            BandwidthMode::CrossValidated => {
                let cv = &self.cross_validation;
                if cv.scales.is_empty()
                    || cv.scales.iter().any(|s| !s.is_finite() || *s <= 0.0)
                {
                    return Err(SuitabilityError::invalid_config(
                        "crossValidation.scales must be non-empty and positive",
                    ));
                }
                if matches!(cv.folds, Some(k) if k < 2) {
                    return Err(SuitabilityError::invalid_config(
                        "crossValidation.folds must be at least 2",
                    ));
                }
            }
            BandwidthMode::RuleOfThumb => {}
        }

        Ok(())
    }

    /// Minimum points per class for a `dim`-dimensional fit
    pub fn min_samples(&self, dim: usize) -> usize {
        self.min_samples_per_class.unwrap_or(2 * dim)
    }
}
