//! Prediction Projector
//!
//! Applies a fitted [`SuitabilityScorer`] to arbitrary feature tables (typically
//! a full environmental grid) and hands the scored points back out for
//! rasterization.
//!
//! Grid rows are independent, so projection is a parallel map over fixed-size
//! batches on a bounded rayon pool. A [`CancellationToken`] is checked before
//! each batch; a cancelled projection returns an error, never a partial grid.

use crate::config::SuitabilityConfig;
use crate::data::{FeatureTable, PointId};
use crate::error::{SuitabilityError, SuitabilityResult};
use crate::scorer::SuitabilityScorer;
use crate::utils::normalization::Normalizer;
use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cooperative cancellation flag with an optional deadline
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that trips once `timeout` has elapsed from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Suitability of one point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuitabilityScore {
    pub point_id: PointId,
    /// Density ratio in [0, 1)
    pub raw: f64,
    /// Rescaled per the configured normalization, in [0, 1]
    ///
    /// Relative to a reference set: the grid's own ratios for a projection,
    /// the training ratios for a single engine prediction (or `raw` when the
    /// training points have not been scored yet).
    pub normalized: f64,
}

/// Scored grid handed to rasterization
#[derive(Debug, Clone)]
pub struct ScoredGrid {
    scores: Vec<SuitabilityScore>,
    normalizer: Normalizer,
}

impl ScoredGrid {
    pub fn scores(&self) -> &[SuitabilityScore] {
        &self.scores
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Point id → normalized suitability
    pub fn to_map(&self) -> FxHashMap<PointId, f64> {
        self.scores
            .iter()
            .map(|s| (s.point_id.clone(), s.normalized))
            .collect()
    }

    /// Write `id,raw,suitability` rows
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let ids: Vec<&str> = self.scores.iter().map(|s| s.point_id.as_str()).collect();
        let raw: Vec<f64> = self.scores.iter().map(|s| s.raw).collect();
        let normalized: Vec<f64> = self.scores.iter().map(|s| s.normalized).collect();

        let mut df = DataFrame::new(vec![
            Column::new("id".into(), ids),
            Column::new("raw".into(), raw),
            Column::new("suitability".into(), normalized),
        ])?;

        let mut file =
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .with_context(|| format!("Failed to write scores to {:?}", path))?;
        Ok(())
    }
}

/// Batched, parallel scorer for out-of-sample points
pub struct PredictionProjector<'a> {
    scorer: &'a SuitabilityScorer,
    workers: Option<usize>,
    batch_size: usize,
}

impl<'a> PredictionProjector<'a> {
    /// `workers = None` uses the global rayon pool
    pub fn new(scorer: &'a SuitabilityScorer, workers: Option<usize>, batch_size: usize) -> Self {
        Self {
            scorer,
            workers,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(scorer: &'a SuitabilityScorer, config: &SuitabilityConfig) -> Self {
        Self::new(scorer, config.workers, config.batch_size)
    }

    /// Raw ratio for one raw feature vector using the stored transform
    pub fn predict_point(&self, raw: &[f64]) -> SuitabilityResult<f64> {
        self.scorer.score(raw)
    }

    /// Score every row of `grid`, normalizing against the grid's own raw ratios
    pub fn project(
        &self,
        grid: &FeatureTable,
        token: &CancellationToken,
    ) -> SuitabilityResult<ScoredGrid> {
        grid.check_same_covariates(self.scorer.transform().covariates())?;

        let started = Instant::now();
        let raw = self.raw_ratios(grid, token)?;
        let normalizer = self.scorer.normalizer(&raw);

        let scores = grid
            .ids()
            .iter()
            .zip(&raw)
            .map(|(id, &r)| SuitabilityScore {
                point_id: id.clone(),
                raw: r,
                normalized: normalizer.apply(r),
            })
            .collect();

        info!(
            "Projected {} points in {:.2}s",
            grid.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(ScoredGrid { scores, normalizer })
    }

    /// Raw ratios in row order; fails as a whole if any batch fails or is cancelled
    fn raw_ratios(
        &self,
        grid: &FeatureTable,
        token: &CancellationToken,
    ) -> SuitabilityResult<Vec<f64>> {
        let total = grid.len().div_ceil(self.batch_size);
        let completed = AtomicUsize::new(0);

        let run = || -> SuitabilityResult<Vec<Vec<f64>>> {
            (0..total)
                .into_par_iter()
                .map(|batch| {
                    if token.is_cancelled() {
                        return Err(SuitabilityError::Cancelled {
                            completed: completed.load(Ordering::Relaxed),
                            total,
                        });
                    }
                    let start = batch * self.batch_size;
                    let end = (start + self.batch_size).min(grid.len());
                    let ratios = (start..end)
                        .map(|idx| self.scorer.score(grid.row(idx)))
                        .collect::<SuitabilityResult<Vec<f64>>>()?;

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Batch {}/{} scored", done, total);
                    Ok(ratios)
                })
                .collect()
        };

        let batches = match self.workers {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| {
                        SuitabilityError::invalid_config(format!("worker pool: {}", e))
                    })?;
                pool.install(run)?
            }
            None => run()?,
        };

        Ok(batches.into_iter().flatten().collect())
    }
}
