//! Feature Tables
//!
//! In-memory representation of the presence, background and grid tables handed
//! over by the feature table builder. Each row is one point: an identifier plus
//! one value per named covariate.
//!
//! Tables can be built directly from rows or loaded from CSV/Parquet with Polars.
//! Every column except the id column is treated as a covariate and cast to f64.

use crate::error::{check_dimension, SuitabilityError, SuitabilityResult};
use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier of the point a row came from (row id, encoded coordinate, ...)
pub type PointId = String;

/// Class of a training point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Presence,
    Background,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Presence => write!(f, "presence"),
            Label::Background => write!(f, "background"),
        }
    }
}

/// A feature vector with its class label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: Vec<f64>,
    pub label: Label,
}

/// Row-major table of covariate values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    covariates: Vec<String>,
    ids: Vec<PointId>,
    /// n_rows × n_covariates, row-major
    values: Vec<f64>,
}

impl FeatureTable {
    /// Build a table from explicit ids and rows
    ///
    /// Rejects ragged rows, non-finite values and duplicate covariate names.
    pub fn new(
        covariates: Vec<String>,
        ids: Vec<PointId>,
        rows: Vec<Vec<f64>>,
    ) -> SuitabilityResult<Self> {
        if covariates.is_empty() {
            return Err(SuitabilityError::missing("table has no covariate columns"));
        }

        let mut seen = FxHashSet::default();
        if !covariates.iter().all(|name| seen.insert(name.as_str())) {
            let mut unique: Vec<String> = Vec::new();
            for name in &covariates {
                if !unique.contains(name) {
                    unique.push(name.clone());
                }
            }
            return Err(SuitabilityError::CovariateMismatch {
                expected: unique,
                actual: covariates,
            });
        }

        check_dimension(ids.len(), rows.len())?;

        let dim = covariates.len();
        let mut values = Vec::with_capacity(rows.len() * dim);
        for (row, id) in rows.iter().zip(&ids) {
            check_dimension(dim, row.len())?;
            for (value, name) in row.iter().zip(&covariates) {
                if !value.is_finite() {
                    return Err(SuitabilityError::missing(format!(
                        "row '{}', covariate '{}'",
                        id, name
                    )));
                }
            }
            values.extend_from_slice(row);
        }

        Ok(Self {
            covariates,
            ids,
            values,
        })
    }

    /// Build a table whose point ids are the row indices
    pub fn from_rows(covariates: Vec<String>, rows: Vec<Vec<f64>>) -> SuitabilityResult<Self> {
        let ids = (0..rows.len()).map(|i| i.to_string()).collect();
        Self::new(covariates, ids, rows)
    }

    /// Load a table from a CSV file with a header row
    ///
    /// `id_column` holds the point identifier. When the column is absent, row
    /// indices are used instead.
    pub fn from_csv(path: &Path, id_column: &str) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .with_context(|| format!("Failed to open CSV: {:?}", path))?
            .finish()
            .with_context(|| format!("Failed to parse CSV: {:?}", path))?;

        Self::from_dataframe(&df, id_column)
            .with_context(|| format!("Invalid feature table: {:?}", path))
    }

    /// Load a table from a Parquet file
    pub fn from_parquet(path: &Path, id_column: &str) -> Result<Self> {
        let df = LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to scan parquet: {:?}", path))?
            .collect()
            .with_context(|| format!("Failed to load parquet: {:?}", path))?;

        Self::from_dataframe(&df, id_column)
            .with_context(|| format!("Invalid feature table: {:?}", path))
    }

    /// Convert a Polars DataFrame (id column + numeric covariates)
    pub fn from_dataframe(df: &DataFrame, id_column: &str) -> Result<Self> {
        let height = df.height();

        let ids: Vec<PointId> = match df.column(id_column) {
            Ok(col) => {
                let as_str = col.cast(&DataType::String)?;
                as_str
                    .str()?
                    .into_iter()
                    .enumerate()
                    .map(|(idx, opt)| {
                        opt.map(|s| s.to_string())
                            .ok_or_else(|| anyhow!("Null point id at row {}", idx))
                    })
                    .collect::<Result<_>>()?
            }
            Err(_) => (0..height).map(|i| i.to_string()).collect(),
        };

        let covariates: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != id_column)
            .map(|name| name.to_string())
            .collect();

        let mut rows = vec![Vec::with_capacity(covariates.len()); height];
        for name in &covariates {
            let col = df
                .column(name)?
                .cast(&DataType::Float64)
                .with_context(|| format!("Covariate '{}' is not numeric", name))?;
            for (idx, value) in col.f64()?.into_iter().enumerate() {
                let value = value
                    .ok_or_else(|| anyhow!("Null value in covariate '{}' at row {}", name, idx))?;
                rows[idx].push(value);
            }
        }

        Ok(Self::new(covariates, ids, rows)?)
    }

    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    pub fn ids(&self) -> &[PointId] {
        &self.ids
    }

    /// Number of covariates per row
    pub fn dim(&self) -> usize {
        self.covariates.len()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        let dim = self.dim();
        &self.values[idx * dim..(idx + 1) * dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.dim())
    }

    /// Values of one covariate across all rows
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows().map(|row| row[idx]).collect()
    }

    /// Fail unless `other` carries exactly the same covariates in the same order
    pub fn check_same_covariates(&self, other: &[String]) -> SuitabilityResult<()> {
        if self.covariates.as_slice() != other {
            return Err(SuitabilityError::CovariateMismatch {
                expected: other.to_vec(),
                actual: self.covariates.clone(),
            });
        }
        Ok(())
    }

    /// Attach a label to every row
    pub fn labeled(&self, label: Label) -> Vec<LabeledSample> {
        self.rows()
            .map(|row| LabeledSample {
                features: row.to_vec(),
                label,
            })
            .collect()
    }
}
