//! Density Estimators
//!
//! Multivariate kernel density estimates over the preprocessed feature space:
//!
//! ```text
//! f(x) = 1 / (n · Π h_j) · Σ_i K((x − X_i) / h)
//! ```
//!
//! The sum is always accumulated in log space, so a query far outside the
//! training support gets a density that decays smoothly toward zero instead
//! of an underflowed or undefined value.
//!
//! A [`DensityModel`] is immutable after fitting and holds no interior
//! mutability, so evaluation is safe from any number of threads. Retraining
//! builds a new model.

pub mod bandwidth;
pub mod cv;
pub mod kernel;

pub use bandwidth::Bandwidths;

use crate::config::{KernelKind, SuitabilityConfig};
use crate::data::Label;
use crate::error::{check_dimension, SuitabilityError, SuitabilityResult};
use kernel::log_sum_exp;
use tracing::debug;

/// Fitted kernel density estimate for one class
#[derive(Debug, Clone)]
pub struct DensityModel {
    label: Label,
    dim: usize,
    /// n × dim, row-major, preprocessed
    points: Vec<f64>,
    bandwidths: Bandwidths,
    kernel: KernelKind,
    /// −ln n − Σ ln h_j
    log_scale: f64,
}

impl DensityModel {
    /// Fit a density over preprocessed points
    ///
    /// # Errors
    /// * `InsufficientSample` when fewer than `config.min_samples(dim)` points
    /// * `DimensionMismatch` on ragged rows or a wrong-length fixed bandwidth
    /// * `MissingValue` when the points carry no covariates
    pub fn fit(
        points: &[Vec<f64>],
        label: Label,
        config: &SuitabilityConfig,
    ) -> SuitabilityResult<Self> {
        let dim = points.first().map_or(0, |p| p.len());
        let required = config.min_samples(dim).max(1);
        if points.len() < required {
            return Err(SuitabilityError::InsufficientSample {
                class: Some(label),
                count: points.len(),
                required,
            });
        }
        if dim == 0 {
            return Err(SuitabilityError::missing(format!(
                "{} feature vectors (no covariates)",
                label
            )));
        }

        let mut flat = Vec::with_capacity(points.len() * dim);
        for p in points {
            check_dimension(dim, p.len())?;
            flat.extend_from_slice(p);
        }

        let bandwidths = bandwidth::select(&flat, dim, config)?;
        debug!(
            "Fitted {} density: n = {}, kernel = {:?}, bandwidths = {:?}",
            label,
            points.len(),
            config.kernel,
            bandwidths.as_slice()
        );

        Ok(Self::with_bandwidths(label, dim, flat, bandwidths, config.kernel))
    }

    /// Build a model from already-chosen bandwidths
    pub fn with_bandwidths(
        label: Label,
        dim: usize,
        points: Vec<f64>,
        bandwidths: Bandwidths,
        kernel: KernelKind,
    ) -> Self {
        let n = points.len() / dim.max(1);
        let log_scale = -(n as f64).ln() - bandwidths.iter().map(|h| h.ln()).sum::<f64>();
        Self {
            label,
            dim,
            points,
            bandwidths,
            kernel,
            log_scale,
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_samples(&self) -> usize {
        self.points.len() / self.dim.max(1)
    }

    pub fn bandwidths(&self) -> &[f64] {
        &self.bandwidths
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    /// ln f(x); `-inf` where a compact kernel has no support
    pub fn log_density(&self, x: &[f64]) -> SuitabilityResult<f64> {
        check_dimension(self.dim, x.len())?;
        Ok(self.log_density_unchecked(x))
    }

    /// f(x) ≥ 0
    pub fn density(&self, x: &[f64]) -> SuitabilityResult<f64> {
        Ok(self.log_density(x)?.exp())
    }

    pub(crate) fn log_density_unchecked(&self, x: &[f64]) -> f64 {
        let support = self.kernel.support_r2();
        let terms = self.points.chunks_exact(self.dim).filter_map(|xi| {
            let r2 = scaled_r2(x, xi, &self.bandwidths);
            (r2 < support).then(|| self.kernel.log_weight(r2, self.dim))
        });
        log_sum_exp(terms) + self.log_scale
    }
}

/// Σ ((a_j − b_j) / h_j)²
#[inline]
pub(crate) fn scaled_r2(a: &[f64], b: &[f64], h: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .zip(h)
        .map(|((x, y), w)| {
            let u = (x - y) / w;
            u * u
        })
        .sum()
}

/// Presence and background densities fitted in the same feature space
#[derive(Debug, Clone)]
pub struct DensityPair {
    pub presence: DensityModel,
    pub background: DensityModel,
}

impl DensityPair {
    /// Fit both classes independently (in parallel); both must succeed
    pub fn fit(
        presence: &[Vec<f64>],
        background: &[Vec<f64>],
        config: &SuitabilityConfig,
    ) -> SuitabilityResult<Self> {
        let (presence, background) = rayon::join(
            || DensityModel::fit(presence, Label::Presence, config),
            || DensityModel::fit(background, Label::Background, config),
        );
        let pair = Self {
            presence: presence?,
            background: background?,
        };
        check_dimension(pair.presence.dim(), pair.background.dim())?;
        Ok(pair)
    }

    pub fn dim(&self) -> usize {
        self.presence.dim()
    }
}
