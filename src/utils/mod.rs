//! Utility modules for suitability scoring
//!
//! - Normalization: min-max and percentile rescaling of raw ratios

pub mod normalization;

// Re-export commonly used types
pub use normalization::{min_max_normalize, percentile_normalize, Normalizer};
