//! Kernel profiles in log space
//!
//! Kernels are evaluated on the squared scaled distance `r² = Σ ((x_j − X_j) / h_j)²`.
//! Returning logs lets the estimator accumulate with log-sum-exp instead of
//! summing underflowed zeros.

use crate::config::KernelKind;
use std::f64::consts::PI;

impl KernelKind {
    /// log K(u) for a point at squared scaled distance `r2` in `dim` dimensions
    ///
    /// Includes the kernel's normalising constant, so `exp` of this integrates
    /// to 1 over u-space.
    pub fn log_weight(self, r2: f64, dim: usize) -> f64 {
        match self {
            KernelKind::Gaussian => -0.5 * r2 + self.log_constant(dim),
            KernelKind::Epanechnikov => {
                if r2 >= 1.0 {
                    f64::NEG_INFINITY
                } else {
                    (1.0 - r2).ln() + self.log_constant(dim)
                }
            }
        }
    }

    /// log of the normalising constant in `dim` dimensions
    ///
    /// * Gaussian: `(2π)^(−d/2)`
    /// * Epanechnikov: `(d + 2) / (2 · V_d)`, `V_d` the unit-ball volume
    pub fn log_constant(self, dim: usize) -> f64 {
        let d = dim as f64;
        match self {
            KernelKind::Gaussian => -0.5 * d * (2.0 * PI).ln(),
            KernelKind::Epanechnikov => ((d + 2.0) / 2.0).ln() - log_unit_ball_volume(dim),
        }
    }

    /// Squared radius beyond which the kernel is exactly zero
    pub fn support_r2(self) -> f64 {
        match self {
            KernelKind::Gaussian => f64::INFINITY,
            KernelKind::Epanechnikov => 1.0,
        }
    }
}

/// `ln V_d = (d/2)·ln π − ln Γ(d/2 + 1)`
pub fn log_unit_ball_volume(dim: usize) -> f64 {
    let half = dim as f64 / 2.0;
    half * PI.ln() - libm::lgamma(half + 1.0)
}

/// Numerically stable `ln Σ exp(x_i)`; `-inf` for an empty or all-`-inf` input
pub fn log_sum_exp<I>(terms: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for x in terms {
        if x == f64::NEG_INFINITY {
            continue;
        }
        if x > max {
            sum = sum * (max - x).exp() + 1.0;
            max = x;
        } else {
            sum += (x - max).exp();
        }
    }

    if max == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        max + sum.ln()
    }
}
