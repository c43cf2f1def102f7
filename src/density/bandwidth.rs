//! Bandwidth selection
//!
//! All bandwidths are per-dimension and expressed in the preprocessed feature
//! space. Modes:
//! - `RuleOfThumb`: normal-reference rule (Silverman or Scott) scaled by the
//!   class sample's spread in each dimension
//! - `Fixed`: caller-supplied scalar or vector
//! - `CrossValidated`: best multiple of the rule-of-thumb width (see `cv`)

use crate::config::{BandwidthMode, BandwidthRule, FixedBandwidth, SuitabilityConfig};
use crate::density::cv;
use crate::error::{check_dimension, SuitabilityError, SuitabilityResult};
use smallvec::SmallVec;
use tracing::warn;

/// One width per dimension; covariate counts rarely exceed 8
pub type Bandwidths = SmallVec<[f64; 8]>;

/// Choose bandwidths for a flat row-major sample according to `config`
pub fn select(points: &[f64], dim: usize, config: &SuitabilityConfig) -> SuitabilityResult<Bandwidths> {
    match config.bandwidth_mode {
        BandwidthMode::RuleOfThumb => Ok(rule_of_thumb(points, dim, config.bandwidth_rule)),
        BandwidthMode::Fixed => {
            let fixed_bw = config.fixed_bandwidth.as_ref().ok_or_else(|| {
                SuitabilityError::invalid_config("bandwidthMode 'fixed' requires fixedBandwidth")
            })?;
            fixed(fixed_bw, dim)
        }
        BandwidthMode::CrossValidated => {
            let anchor = rule_of_thumb(points, dim, config.bandwidth_rule);
            cv::select_scale(points, dim, &anchor, config)
        }
    }
}

/// Normal-reference bandwidth per dimension
///
/// A dimension with zero within-class spread falls back to the pooled spread
/// of the preprocessed space (1.0).
pub fn rule_of_thumb(points: &[f64], dim: usize, rule: BandwidthRule) -> Bandwidths {
    let n = points.len() / dim.max(1);
    let factor = rule_factor(rule, n, dim);

    (0..dim)
        .map(|j| {
            let sigma = column_std(points, dim, j);
            let sigma = if sigma.is_finite() && sigma > 0.0 {
                sigma
            } else {
                warn!(
                    "Dimension {} has no within-class spread (n = {}), using pooled scale",
                    j, n
                );
                1.0
            };
            sigma * factor
        })
        .collect()
}

/// Sample-size factor of the normal-reference rule
///
/// * Silverman: `(4 / ((d + 2) · n))^(1 / (d + 4))`
/// * Scott:     `n^(−1 / (d + 4))`
pub fn rule_factor(rule: BandwidthRule, n: usize, dim: usize) -> f64 {
    let n = n.max(1) as f64;
    let d = dim as f64;
    let exponent = 1.0 / (d + 4.0);
    match rule {
        BandwidthRule::Silverman => (4.0 / ((d + 2.0) * n)).powf(exponent),
        BandwidthRule::Scott => n.powf(-exponent),
    }
}

/// Expand a configured fixed bandwidth to one width per dimension
pub fn fixed(bandwidth: &FixedBandwidth, dim: usize) -> SuitabilityResult<Bandwidths> {
    let widths: Bandwidths = match bandwidth {
        FixedBandwidth::Scalar(h) => std::iter::repeat(*h).take(dim).collect(),
        FixedBandwidth::PerDimension(hs) => {
            check_dimension(dim, hs.len())?;
            hs.iter().copied().collect()
        }
    };

    if widths.iter().any(|h| !h.is_finite() || *h <= 0.0) {
        return Err(SuitabilityError::invalid_config(
            "fixedBandwidth values must be finite and positive",
        ));
    }
    Ok(widths)
}

fn column_std(points: &[f64], dim: usize, j: usize) -> f64 {
    let n = points.len() / dim;
    if n < 2 {
        return f64::NAN;
    }
    let mean = points.chunks_exact(dim).map(|row| row[j]).sum::<f64>() / n as f64;
    let ss: f64 = points
        .chunks_exact(dim)
        .map(|row| (row[j] - mean).powi(2))
        .sum();
    (ss / (n as f64 - 1.0)).sqrt()
}
