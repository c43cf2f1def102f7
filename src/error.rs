//! Error taxonomy for the suitability engine
//!
//! Every variant is a caller-side condition (bad input, misuse, or too little
//! data). Nothing here is transient, so nothing is retried.

use crate::data::Label;
use crate::engine::EngineStage;
use thiserror::Error;

/// Result alias used throughout the engine
pub type SuitabilityResult<T> = Result<T, SuitabilityError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SuitabilityError {
    /// A covariate has zero (or non-finite) spread across the pooled sample
    #[error("covariate '{covariate}' has zero variance and cannot be scaled")]
    DegenerateFeature { covariate: String },

    /// Too few points to fit a density or a covariate scale
    ///
    /// `class` is `None` for the pooled presence + background sample.
    #[error("{} sample has {count} points, at least {required} required", sample_name(.class))]
    InsufficientSample {
        class: Option<Label>,
        count: usize,
        required: usize,
    },

    /// Scoring or prediction requested before both densities exist
    #[error("model not fitted: {0}")]
    ModelNotFitted(&'static str),

    /// Evaluation needs at least one presence and one background score
    #[error("cannot evaluate: {class} class is empty")]
    EmptyClass { class: Label },

    /// Feature vector length differs from the fitted dimensionality
    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Covariate names (or their order) differ between two tables
    #[error("covariate mismatch: expected {expected:?}, got {actual:?}")]
    CovariateMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A null, NaN or infinite value reached the engine
    #[error("missing or non-finite value in {context}")]
    MissingValue { context: String },

    /// Engine step called from a stage it cannot run in
    #[error("cannot {operation} from stage '{stage}'")]
    InvalidStage {
        operation: &'static str,
        stage: EngineStage,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cooperative cancellation or deadline hit between batches
    #[error("projection cancelled after {completed} of {total} batches")]
    Cancelled { completed: usize, total: usize },
}

impl SuitabilityError {
    pub(crate) fn missing(context: impl Into<String>) -> Self {
        SuitabilityError::MissingValue {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        SuitabilityError::InvalidConfig(msg.into())
    }
}

fn sample_name(class: &Option<Label>) -> String {
    class.map_or_else(|| "pooled".to_string(), |c| c.to_string())
}

/// Check a vector's length against the fitted dimensionality
pub(crate) fn check_dimension(expected: usize, actual: usize) -> SuitabilityResult<()> {
    if expected != actual {
        return Err(SuitabilityError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
