//! Habitat Scorer Rust Implementation
//!
//! Kernel density habitat suitability from presence-only occurrence records.
//!
//! Module layout follows the scoring pipeline:
//! - `data`: Feature tables loaded with Polars
//! - `preprocess`: Pooled standardization of covariates
//! - `density/`: Presence and background kernel density estimates
//! - `scorer`: Density-ratio suitability `p / (p + b + ε)`
//! - `utils/`: Output normalization (min-max, percentile)
//! - `evaluation`: Mid-rank AUC, ROC and max-TSS threshold
//! - `projector`: Parallel, cancellable grid projection
//! - `engine`: Stage machine tying the steps together

pub mod config;
pub mod data;
pub mod density;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod preprocess;
pub mod projector;
pub mod scorer;
pub mod utils;

// Re-export commonly used types
pub use config::{BandwidthMode, KernelKind, NormalizationMode, SuitabilityConfig};
pub use data::{FeatureTable, Label, LabeledSample, PointId};
pub use density::{DensityModel, DensityPair};
pub use engine::{EngineStage, SuitabilityEngine};
pub use error::{SuitabilityError, SuitabilityResult};
pub use evaluation::{EvaluationResult, ScoredSample};
pub use preprocess::FeatureTransform;
pub use projector::{CancellationToken, PredictionProjector, ScoredGrid, SuitabilityScore};
pub use scorer::SuitabilityScorer;
pub use utils::{min_max_normalize, percentile_normalize, Normalizer};
