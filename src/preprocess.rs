//! Feature Preprocessor
//!
//! Fits a per-covariate centre/scale on the pooled presence + background sample
//! and returns it as an immutable [`FeatureTransform`]. The same transform must
//! be reapplied, unchanged, to every grid point at prediction time: refitting on
//! grid data would move the grid into a different feature space from the one
//! the densities were trained in.

use crate::config::ScalingMode;
use crate::data::FeatureTable;
use crate::error::{check_dimension, SuitabilityError, SuitabilityResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Consistency constant making MAD estimate σ for normal data
const MAD_TO_SIGMA: f64 = 1.4826;

/// Fitted covariate scaling, `z = (x − centre) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    covariates: Vec<String>,
    centres: Vec<f64>,
    scales: Vec<f64>,
    mode: ScalingMode,
}

impl FeatureTransform {
    /// Fit from one column of raw values per covariate
    ///
    /// # Errors
    /// * `DegenerateFeature` if a covariate has zero spread
    /// * `InsufficientSample` if a column has fewer than 2 values
    /// * `MissingValue` on NaN/Inf input
    pub fn fit(
        covariates: Vec<String>,
        columns: &[Vec<f64>],
        mode: ScalingMode,
    ) -> SuitabilityResult<Self> {
        check_dimension(covariates.len(), columns.len())?;

        let mut centres = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for (name, values) in covariates.iter().zip(columns) {
            // Spread is undefined below two points
            if values.len() < 2 {
                return Err(SuitabilityError::InsufficientSample {
                    class: None,
                    count: values.len(),
                    required: 2,
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SuitabilityError::missing(format!("covariate '{}'", name)));
            }

            let (centre, scale) = match mode {
                ScalingMode::Standardize => mean_and_std(values),
                ScalingMode::Robust => median_and_mad(values),
            };

            if !scale.is_finite() || scale <= 0.0 {
                return Err(SuitabilityError::DegenerateFeature {
                    covariate: name.clone(),
                });
            }

            centres.push(centre);
            scales.push(scale);
        }

        Ok(Self {
            covariates,
            centres,
            scales,
            mode,
        })
    }

    /// Fit on the union of presence and background tables
    ///
    /// Both tables must carry the same covariates in the same order.
    pub fn fit_tables(
        presence: &FeatureTable,
        background: &FeatureTable,
        mode: ScalingMode,
    ) -> SuitabilityResult<Self> {
        background.check_same_covariates(presence.covariates())?;

        let columns: Vec<Vec<f64>> = (0..presence.dim())
            .map(|j| {
                let mut pooled = presence.column(j);
                pooled.extend(background.column(j));
                pooled
            })
            .collect();

        Self::fit(presence.covariates().to_vec(), &columns, mode)
    }

    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn centres(&self) -> &[f64] {
        &self.centres
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn mode(&self) -> ScalingMode {
        self.mode
    }

    pub fn dim(&self) -> usize {
        self.covariates.len()
    }

    /// Map a raw feature vector into the fitted feature space
    pub fn apply(&self, raw: &[f64]) -> SuitabilityResult<Vec<f64>> {
        check_dimension(self.dim(), raw.len())?;
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(SuitabilityError::missing("feature vector"));
        }
        Ok(raw
            .iter()
            .zip(self.centres.iter().zip(&self.scales))
            .map(|(x, (c, s))| (x - c) / s)
            .collect())
    }

    /// Transform every row of a table with matching covariates
    pub fn apply_table(&self, table: &FeatureTable) -> SuitabilityResult<Vec<Vec<f64>>> {
        table.check_same_covariates(&self.covariates)?;
        table.rows().map(|row| self.apply(row)).collect()
    }

    /// Map a preprocessed vector back to raw covariate units
    pub fn inverse(&self, scaled: &[f64]) -> SuitabilityResult<Vec<f64>> {
        check_dimension(self.dim(), scaled.len())?;
        Ok(scaled
            .iter()
            .zip(self.centres.iter().zip(&self.scales))
            .map(|(z, (c, s))| z * s + c)
            .collect())
    }
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n - 1.0)).sqrt())
}

fn median_and_mad(values: &[f64]) -> (f64, f64) {
    let mut buf = values.to_vec();
    let median = median_inplace(&mut buf);
    for v in buf.iter_mut() {
        *v = (*v - median).abs();
    }
    (median, median_inplace(&mut buf) * MAD_TO_SIGMA)
}

/// Median via quickselect; reorders `vals`
pub(crate) fn median_inplace(vals: &mut [f64]) -> f64 {
    let n = vals.len();
    let mid = n / 2;
    let cmp = |a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(Ordering::Equal);

    let (lower, upper, _) = vals.select_nth_unstable_by(mid, cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return upper;
    }
    let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (lower_max + upper) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_standardize_uses_sample_std() {
        let t = FeatureTransform::fit(
            names(&["x"]),
            &[vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]],
            ScalingMode::Standardize,
        )
        .unwrap();
        assert_relative_eq!(t.centres()[0], 5.0);
        // ss = 32, n - 1 = 7
        assert_relative_eq!(t.scales()[0], (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_is_degenerate() {
        let err = FeatureTransform::fit(
            names(&["ok", "flat"]),
            &[vec![1.0, 2.0, 3.0], vec![5.0, 5.0, 5.0]],
            ScalingMode::Standardize,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SuitabilityError::DegenerateFeature {
                covariate: "flat".into()
            }
        );
    }

    #[test]
    fn test_single_pooled_point_is_insufficient() {
        let presence = FeatureTable::from_rows(names(&["x", "y"]), vec![vec![1.0, 2.0]]).unwrap();
        let background = FeatureTable::from_rows(names(&["x", "y"]), vec![]).unwrap();
        assert_eq!(
            FeatureTransform::fit_tables(&presence, &background, ScalingMode::Standardize),
            Err(SuitabilityError::InsufficientSample {
                class: None,
                count: 1,
                required: 2
            })
        );
    }

    #[test]
    fn test_robust_rejects_constant_bulk() {
        // MAD is zero once more than half the values coincide
        let err = FeatureTransform::fit(
            names(&["x"]),
            &[vec![1.0, 1.0, 1.0, 1.0, 50.0]],
            ScalingMode::Robust,
        )
        .unwrap_err();
        assert!(matches!(err, SuitabilityError::DegenerateFeature { .. }));
    }

    #[test]
    fn test_robust_median_and_mad() {
        let t = FeatureTransform::fit(
            names(&["x"]),
            &[vec![1.0, 2.0, 3.0, 4.0, 100.0]],
            ScalingMode::Robust,
        )
        .unwrap();
        assert_eq!(t.mode(), ScalingMode::Robust);
        assert_relative_eq!(t.centres()[0], 3.0);
        // |x - 3| = [2, 1, 0, 1, 97] → median 1
        assert_relative_eq!(t.scales()[0], MAD_TO_SIGMA);
    }

    #[test]
    fn test_median_even_length() {
        let mut vals = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(median_inplace(&mut vals), 2.5);
    }

    #[test]
    fn test_pools_presence_and_background() {
        let presence =
            FeatureTable::from_rows(names(&["x"]), vec![vec![10.0], vec![12.0]]).unwrap();
        let background =
            FeatureTable::from_rows(names(&["x"]), vec![vec![0.0], vec![2.0]]).unwrap();
        let t = FeatureTransform::fit_tables(&presence, &background, ScalingMode::Standardize)
            .unwrap();
        assert_relative_eq!(t.centres()[0], 6.0);
    }

    #[test]
    fn test_apply_and_inverse_agree() {
        let t = FeatureTransform::fit(
            names(&["a", "b"]),
            &[vec![0.0, 10.0, 20.0], vec![-1.0, 0.0, 1.0]],
            ScalingMode::Standardize,
        )
        .unwrap();
        let raw = [15.0, 0.5];
        let back = t.inverse(&t.apply(&raw).unwrap()).unwrap();
        assert_relative_eq!(back[0], raw[0], epsilon = 1e-12);
        assert_relative_eq!(back[1], raw[1], epsilon = 1e-12);
    }

    #[test]
    fn test_apply_checks_dimension() {
        let t = FeatureTransform::fit(
            names(&["a", "b"]),
            &[vec![0.0, 1.0], vec![0.0, 1.0]],
            ScalingMode::Standardize,
        )
        .unwrap();
        assert_eq!(
            t.apply(&[1.0, 2.0, 3.0]),
            Err(SuitabilityError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_mismatched_tables_rejected() {
        let presence = FeatureTable::from_rows(names(&["x"]), vec![vec![1.0]]).unwrap();
        let background = FeatureTable::from_rows(names(&["y"]), vec![vec![1.0]]).unwrap();
        assert!(matches!(
            FeatureTransform::fit_tables(&presence, &background, ScalingMode::Standardize),
            Err(SuitabilityError::CovariateMismatch { .. })
        ));
    }
}
