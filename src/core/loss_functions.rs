//! Robust loss functions for down-weighting outlying image measurements.
//!
//! A loss maps the whitened squared residual `s = ||r||²` of one view to a
//! robust cost `ρ(s)`. Robust noise models use `ρ'(s)` to reweight the whitened
//! Jacobian and residual of that view before the point is eliminated, so the
//! Schur complement sees an iteratively-reweighted least-squares system.
//!
//! # Example
//!
//! ```
//! use apex_smart_factors::core::loss_functions::{HuberLoss, Loss};
//!
//! let huber = HuberLoss::new(1.345).unwrap();
//!
//! let [rho, rho_prime, _] = huber.evaluate(0.5);
//! assert_eq!(rho, 0.5);
//! assert_eq!(rho_prime, 1.0);
//!
//! let [_, rho_prime, _] = huber.evaluate(10.0);
//! assert!(rho_prime < 1.0);
//! ```

use crate::error::{SmartFactorError, SmartFactorResult};
use std::fmt::Debug;

/// Robust loss evaluated at a squared residual norm.
///
/// `evaluate` returns `[ρ(s), ρ'(s), ρ''(s)]`.
pub trait Loss: Debug + Send + Sync {
    /// Evaluate the loss function and its first two derivatives at squared residual `s`.
    fn evaluate(&self, s: f64) -> [f64; 3];

    /// Name of the loss family.
    fn name(&self) -> &'static str;

    /// Parameters that, with the name, determine ρ.
    fn params(&self) -> Vec<f64>;

    /// Same family and parameters within `tol`.
    fn equals(&self, other: &dyn Loss, tol: f64) -> bool {
        let (mine, theirs) = (self.params(), other.params());
        self.name() == other.name()
            && mine.len() == theirs.len()
            && mine.iter().zip(&theirs).all(|(a, b)| (a - b).abs() <= tol)
    }
}

/// Huber loss: quadratic for inliers, linear for outliers.
///
/// ```text
/// ρ(s) = s                 if s ≤ δ²
///        2δ√s - δ²         if s > δ²
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HuberLoss {
    scale: f64,
    scale2: f64,
}

impl HuberLoss {
    /// Create a Huber loss with threshold δ (must be positive and finite).
    pub fn new(scale: f64) -> SmartFactorResult<Self> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "Huber scale must be positive and finite, got {scale}"
            )));
        }
        Ok(HuberLoss {
            scale,
            scale2: scale * scale,
        })
    }

    /// Threshold δ separating inliers from outliers.
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Loss for HuberLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        if s > self.scale2 {
            let r = s.sqrt();
            let rho1 = self.scale / r;
            [2.0 * self.scale * r - self.scale2, rho1, -rho1 / (2.0 * s)]
        } else {
            [s, 1.0, 0.0]
        }
    }

    fn name(&self) -> &'static str {
        "huber"
    }

    fn params(&self) -> Vec<f64> {
        vec![self.scale]
    }
}

/// Cauchy (Lorentzian) loss: stronger suppression of large residuals.
///
/// ```text
/// ρ(s)  = δ² ln(1 + s/δ²)
/// ρ'(s) = 1 / (1 + s/δ²)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CauchyLoss {
    scale: f64,
    scale2: f64,
    c: f64,
}

impl CauchyLoss {
    /// Create a Cauchy loss with scale δ (must be positive and finite).
    pub fn new(scale: f64) -> SmartFactorResult<Self> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "Cauchy scale must be positive and finite, got {scale}"
            )));
        }
        let scale2 = scale * scale;
        Ok(CauchyLoss {
            scale,
            scale2,
            c: 1.0 / scale2,
        })
    }
}

impl Loss for CauchyLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        let sum = 1.0 + s * self.c;
        let inv = 1.0 / sum;
        [self.scale2 * sum.ln(), inv, -self.c * inv * inv]
    }

    fn name(&self) -> &'static str {
        "cauchy"
    }

    fn params(&self) -> Vec<f64> {
        vec![self.scale]
    }
}
