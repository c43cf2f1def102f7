//! Evaluator
//!
//! Discrimination of suitability scores against presence/background labels.
//!
//! AUC is the Mann-Whitney statistic with mid-ranks for ties:
//!
//! ```text
//! AUC = (R₊ − n₊(n₊ + 1) / 2) / (n₊ · n₋)
//! ```
//!
//! i.e. the probability that a random presence point outscores a random
//! background point, ties counting one half. AUC is rank-based, so any
//! order-preserving normalization leaves it unchanged.

use crate::data::Label;
use crate::error::{SuitabilityError, SuitabilityResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// A suitability score with its class label
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredSample {
    pub score: f64,
    pub label: Label,
}

impl ScoredSample {
    pub fn new(score: f64, label: Label) -> Self {
        Self { score, label }
    }
}

/// One ROC operating point: classify as presence when `score >= threshold`
///
/// The curve opens at (0, 0) with a threshold above every score: 1.0 for
/// ratios in [0, 1), `f64::MAX` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// Threshold maximising the True Skill Statistic (TPR − FPR)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdSummary {
    pub threshold: f64,
    pub tss: f64,
    pub tpr: f64,
    pub fpr: f64,
}

/// Outcome of one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub auc: f64,
    pub n_presence: usize,
    pub n_background: usize,
    /// `None` when the curve has no operating point past the opening one
    pub best_threshold: Option<ThresholdSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roc: Option<Vec<RocPoint>>,
}

impl EvaluationResult {
    /// Single-line `key=value` record for logs and reports
    pub fn log_line(&self) -> String {
        let mut line = format!(
            "auc={:.6} n_presence={} n_background={}",
            self.auc, self.n_presence, self.n_background
        );
        if let Some(best) = &self.best_threshold {
            line.push_str(&format!(
                " max_tss={:.4} tss_threshold={:.6}",
                best.tss, best.threshold
            ));
        }
        line
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_line())
    }
}

/// Full evaluation: AUC, best-TSS threshold, and optionally the ROC curve
pub fn evaluate(samples: &[ScoredSample], include_roc: bool) -> SuitabilityResult<EvaluationResult> {
    let (n_presence, n_background) = class_counts(samples)?;
    let auc = auc(samples)?;
    let roc = roc_curve(samples)?;
    let best_threshold = best_tss(&roc);

    Ok(EvaluationResult {
        auc,
        n_presence,
        n_background,
        best_threshold,
        roc: include_roc.then_some(roc),
    })
}

/// Mid-rank AUC
///
/// # Errors
/// * `EmptyClass` if either class has no samples
/// * `MissingValue` on a non-finite score
pub fn auc(samples: &[ScoredSample]) -> SuitabilityResult<f64> {
    let (n_pos, n_neg) = class_counts(samples)?;

    let mut sorted: Vec<&ScoredSample> = samples.iter().collect();
    sorted.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));

    // Sum of (1-based) mid-ranks over presence samples
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start;
        while end + 1 < sorted.len() && sorted[end + 1].score == sorted[start].score {
            end += 1;
        }
        let mid_rank = (start + end) as f64 / 2.0 + 1.0;
        let positives = sorted[start..=end]
            .iter()
            .filter(|s| s.label == Label::Presence)
            .count();
        rank_sum += mid_rank * positives as f64;
        start = end + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// ROC curve from (0, 0) to (1, 1), one point per distinct score
pub fn roc_curve(samples: &[ScoredSample]) -> SuitabilityResult<Vec<RocPoint>> {
    let (n_pos, n_neg) = class_counts(samples)?;

    let mut sorted: Vec<&ScoredSample> = samples.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let top = sorted.first().map_or(0.0, |s| s.score);
    let mut curve = Vec::with_capacity(sorted.len() + 1);
    curve.push(RocPoint {
        threshold: if top < 1.0 { 1.0 } else { f64::MAX },
        fpr: 0.0,
        tpr: 0.0,
    });

    let (mut tp, mut fp) = (0usize, 0usize);
    let mut idx = 0;
    while idx < sorted.len() {
        let threshold = sorted[idx].score;
        while idx < sorted.len() && sorted[idx].score == threshold {
            match sorted[idx].label {
                Label::Presence => tp += 1,
                Label::Background => fp += 1,
            }
            idx += 1;
        }
        curve.push(RocPoint {
            threshold,
            fpr: fp as f64 / n_neg as f64,
            tpr: tp as f64 / n_pos as f64,
        });
    }

    Ok(curve)
}

/// Trapezoidal area under a ROC curve
pub fn roc_area(curve: &[RocPoint]) -> f64 {
    curve
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}

fn best_tss(curve: &[RocPoint]) -> Option<ThresholdSummary> {
    // Skip the opening point, which classifies nothing as presence
    curve
        .iter()
        .skip(1)
        .map(|p| ThresholdSummary {
            threshold: p.threshold,
            tss: p.tpr - p.fpr,
            tpr: p.tpr,
            fpr: p.fpr,
        })
        .fold(None::<ThresholdSummary>, |best, s| match best {
            Some(b) if b.tss >= s.tss => Some(b),
            _ => Some(s),
        })
}

fn class_counts(samples: &[ScoredSample]) -> SuitabilityResult<(usize, usize)> {
    if samples.iter().any(|s| !s.score.is_finite()) {
        return Err(SuitabilityError::missing("suitability scores"));
    }
    let n_pos = samples.iter().filter(|s| s.label == Label::Presence).count();
    let n_neg = samples.len() - n_pos;

    if n_pos == 0 {
        return Err(SuitabilityError::EmptyClass {
            class: Label::Presence,
        });
    }
    if n_neg == 0 {
        return Err(SuitabilityError::EmptyClass {
            class: Label::Background,
        });
    }
    Ok((n_pos, n_neg))
}
