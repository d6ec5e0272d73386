//! Damped point covariance with an explicit rank/condition policy.
//!
//! The eliminated point enters every Schur formula through
//!
//! ```text
//! P = (EᵀE + λ·Damp)⁻¹
//! ```
//!
//! where E is the whitened 2m×3 point Jacobian. Inversion is refused when
//!
//! - any entry of E is not finite,
//! - the undamped EᵀE is rank deficient: `λ_min / λ_max ≤ rank_tolerance`
//!   (damping never rescues a point the views cannot triangulate),
//! - the damped matrix is ill-conditioned: `λ_max / λ_min > condition_threshold`.

use crate::error::{SmartFactorError, SmartFactorResult};
use nalgebra::{Matrix3, MatrixXx3};
use tracing::debug;

/// Default relative eigenvalue floor for the rank test on EᵀE.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-10;

/// Default maximum condition number of the matrix actually inverted.
pub const DEFAULT_CONDITION_THRESHOLD: f64 = 1e10;

/// Diagonal term added to EᵀE before inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DampingMode {
    /// Damp = I (Levenberg-Marquardt).
    #[default]
    Uniform,
    /// Damp = diag(EᵀE) (Marquardt, scale invariant).
    Diagonal,
}

/// Thresholds deciding whether a point can be eliminated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditioningPolicy {
    pub rank_tolerance: f64,
    pub condition_threshold: f64,
}

impl Default for ConditioningPolicy {
    fn default() -> Self {
        Self {
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
        }
    }
}

impl ConditioningPolicy {
    /// Reject non-positive or non-finite thresholds.
    pub fn validate(&self) -> SmartFactorResult<()> {
        if !(self.rank_tolerance > 0.0 && self.rank_tolerance.is_finite()) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "rank tolerance must be positive and finite, got {}",
                self.rank_tolerance
            )));
        }
        if !(self.condition_threshold > 1.0 && self.condition_threshold.is_finite()) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "condition threshold must be finite and greater than one, got {}",
                self.condition_threshold
            )));
        }
        Ok(())
    }

    /// Rank test on the eigenvalues of a symmetric positive semi-definite matrix.
    pub(crate) fn check_rank(&self, min_ev: f64, max_ev: f64) -> SmartFactorResult<()> {
        if !(max_ev > 0.0) || min_ev <= self.rank_tolerance * max_ev {
            debug!(
                "Point normal matrix rank deficient (min_ev={:.2e}, max_ev={:.2e})",
                min_ev, max_ev
            );
            return Err(SmartFactorError::DegenerateConfiguration(format!(
                "point Jacobian has rank < 3 (min_ev={min_ev:.2e}, max_ev={max_ev:.2e})"
            )));
        }
        Ok(())
    }
}

/// Check λ before any numerical work.
pub fn validate_lambda(lambda: f64) -> SmartFactorResult<()> {
    if lambda >= 0.0 && lambda.is_finite() {
        Ok(())
    } else {
        Err(SmartFactorError::InvalidArgument(format!(
            "damping lambda must be non-negative and finite, got {lambda}"
        )))
    }
}

/// EᵀE plus the selected damping term.
pub fn damped_point_normal(e: &MatrixXx3<f64>, lambda: f64, damping: DampingMode) -> Matrix3<f64> {
    let normal = e.transpose() * e;
    match damping {
        DampingMode::Uniform => normal + Matrix3::identity() * lambda,
        DampingMode::Diagonal => normal + Matrix3::from_diagonal(&normal.diagonal()) * lambda,
    }
}

/// Compute `(EᵀE + λ·Damp)⁻¹`, symmetric positive definite on success.
pub fn point_covariance(
    e: &MatrixXx3<f64>,
    lambda: f64,
    damping: DampingMode,
    policy: &ConditioningPolicy,
) -> SmartFactorResult<Matrix3<f64>> {
    validate_lambda(lambda)?;
    policy.validate()?;

    if e.iter().any(|v| !v.is_finite()) {
        return Err(SmartFactorError::DegenerateConfiguration(
            "point Jacobian contains non-finite entries".to_string(),
        ));
    }

    let normal = e.transpose() * e;
    let eigenvalues = normal.symmetric_eigenvalues();
    policy.check_rank(eigenvalues.min(), eigenvalues.max())?;

    let damped = damped_point_normal(e, lambda, damping);
    let eigenvalues = damped.symmetric_eigenvalues();
    let min_ev = eigenvalues.min();
    let max_ev = eigenvalues.max();
    if max_ev / min_ev > policy.condition_threshold {
        debug!(
            "Damped point normal matrix ill-conditioned (cond={:.2e}, lambda={:.2e})",
            max_ev / min_ev,
            lambda
        );
        return Err(SmartFactorError::DegenerateConfiguration(format!(
            "damped point normal matrix ill-conditioned (cond={:.2e})",
            max_ev / min_ev
        )));
    }

    let covariance = damped.cholesky().map(|c| c.inverse()).ok_or_else(|| {
        SmartFactorError::DegenerateConfiguration(
            "damped point normal matrix is not positive definite".to_string(),
        )
    })?;

    Ok((covariance + covariance.transpose()) * 0.5)
}
