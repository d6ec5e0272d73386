//! Noise models for 2D image measurements.
//!
//! A noise model whitens a residual `r` with a square-root information matrix
//! `R` (`RᵀR = Σ⁻¹`) so that `‖R r‖²` is the Mahalanobis distance. Whitening
//! of a factor's view Jacobian, point Jacobian and residual happens jointly in
//! [`NoiseModel::whiten_system`]: the same transform is applied to every
//! column so F and E stay consistent for the Schur complement.
//!
//! Robust models wrap a Gaussian base model with a [`Loss`] and reweight the
//! whitened system by `sqrt(ρ'(s))`.

use crate::core::loss_functions::Loss;
use crate::error::{SmartFactorError, SmartFactorResult};
use nalgebra::{Matrix2, Matrix2xX, Vector2};
use std::fmt::Debug;
use std::sync::Arc;

/// Noise model shared between measurements and factors.
pub type SharedNoiseModel = Arc<dyn NoiseModel>;

/// Whitening capability of a 2D measurement noise model.
pub trait NoiseModel: Debug + Send + Sync {
    /// Square-root information matrix R with RᵀR = Σ⁻¹.
    fn sqrt_information(&self) -> Matrix2<f64>;

    /// Whitened residual R r.
    fn whiten(&self, residual: &Vector2<f64>) -> Vector2<f64> {
        self.sqrt_information() * residual
    }

    /// Squared Mahalanobis distance ‖R r‖² (robust models return ρ of it).
    fn distance(&self, residual: &Vector2<f64>) -> f64 {
        self.whiten(residual).norm_squared()
    }

    /// Whiten a 2-row Jacobian and the matching residual in place.
    fn whiten_system(&self, jacobian: &mut Matrix2xX<f64>, residual: &mut Vector2<f64>) {
        let sqrt_info = self.sqrt_information();
        for mut column in jacobian.column_iter_mut() {
            let whitened = sqrt_info * Vector2::new(column[0], column[1]);
            column.copy_from(&whitened);
        }
        *residual = sqrt_info * *residual;
    }

    /// True when whitening is reweighted by a robust loss.
    fn is_robust(&self) -> bool {
        self.loss().is_some()
    }

    /// Robust loss applied on top of the Gaussian whitening, if any.
    fn loss(&self) -> Option<&dyn Loss> {
        None
    }

    /// Tolerance-based comparison of the whitening transform and the loss.
    fn equals(&self, other: &dyn NoiseModel, tol: f64) -> bool {
        let same_loss = match (self.loss(), other.loss()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.equals(b, tol),
            _ => false,
        };
        same_loss && (self.sqrt_information() - other.sqrt_information()).amax() <= tol
    }
}

fn check_sigma(sigma: f64) -> SmartFactorResult<()> {
    if sigma > 0.0 && sigma.is_finite() {
        Ok(())
    } else {
        Err(SmartFactorError::InvalidArgument(format!(
            "noise sigma must be positive and finite, got {sigma}"
        )))
    }
}

/// Same standard deviation on u and v.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotropicNoise {
    sigma: f64,
}

impl IsotropicNoise {
    pub fn sigma(sigma: f64) -> SmartFactorResult<Self> {
        check_sigma(sigma)?;
        Ok(Self { sigma })
    }

    /// Unit noise: whitening is the identity.
    pub fn unit() -> Self {
        Self { sigma: 1.0 }
    }

    /// Boxed into a [`SharedNoiseModel`].
    pub fn shared(self) -> SharedNoiseModel {
        Arc::new(self)
    }
}

impl NoiseModel for IsotropicNoise {
    fn sqrt_information(&self) -> Matrix2<f64> {
        Matrix2::identity() / self.sigma
    }

    fn whiten_system(&self, jacobian: &mut Matrix2xX<f64>, residual: &mut Vector2<f64>) {
        let inv_sigma = 1.0 / self.sigma;
        *jacobian *= inv_sigma;
        *residual *= inv_sigma;
    }
}

/// Independent standard deviations on u and v.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalNoise {
    sigmas: Vector2<f64>,
}

impl DiagonalNoise {
    pub fn sigmas(sigmas: Vector2<f64>) -> SmartFactorResult<Self> {
        check_sigma(sigmas.x)?;
        check_sigma(sigmas.y)?;
        Ok(Self { sigmas })
    }

    pub fn shared(self) -> SharedNoiseModel {
        Arc::new(self)
    }
}

impl NoiseModel for DiagonalNoise {
    fn sqrt_information(&self) -> Matrix2<f64> {
        Matrix2::new(1.0 / self.sigmas.x, 0.0, 0.0, 1.0 / self.sigmas.y)
    }
}

/// Full 2×2 Gaussian noise.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianNoise {
    sqrt_information: Matrix2<f64>,
}

impl GaussianNoise {
    /// From a covariance Σ = L Lᵀ; the square-root information is L⁻¹.
    pub fn from_covariance(covariance: &Matrix2<f64>) -> SmartFactorResult<Self> {
        if (covariance - covariance.transpose()).amax() > 1e-12 * covariance.amax() {
            return Err(SmartFactorError::InvalidArgument(
                "noise covariance must be symmetric".to_string(),
            ));
        }
        let lower = covariance
            .cholesky()
            .ok_or_else(|| {
                SmartFactorError::InvalidArgument(
                    "noise covariance must be positive definite".to_string(),
                )
            })?
            .l();
        let sqrt_information = lower.try_inverse().ok_or_else(|| {
            SmartFactorError::InvalidArgument("noise covariance is singular".to_string())
        })?;
        Ok(Self { sqrt_information })
    }

    /// From an upper or lower triangular square-root information matrix.
    pub fn from_sqrt_information(sqrt_information: Matrix2<f64>) -> SmartFactorResult<Self> {
        let det = sqrt_information.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(SmartFactorError::InvalidArgument(
                "square-root information must be invertible".to_string(),
            ));
        }
        Ok(Self { sqrt_information })
    }

    pub fn shared(self) -> SharedNoiseModel {
        Arc::new(self)
    }
}

impl NoiseModel for GaussianNoise {
    fn sqrt_information(&self) -> Matrix2<f64> {
        self.sqrt_information
    }
}

/// Gaussian base model reweighted by a robust loss.
#[derive(Debug, Clone)]
pub struct RobustNoise<L: Loss> {
    base: SharedNoiseModel,
    loss: L,
}

impl<L: Loss + 'static> RobustNoise<L> {
    pub fn new(base: SharedNoiseModel, loss: L) -> Self {
        Self { base, loss }
    }

    pub fn loss(&self) -> &L {
        &self.loss
    }

    pub fn shared(self) -> SharedNoiseModel {
        Arc::new(self)
    }
}

impl<L: Loss + 'static> NoiseModel for RobustNoise<L> {
    fn sqrt_information(&self) -> Matrix2<f64> {
        self.base.sqrt_information()
    }

    fn whiten(&self, residual: &Vector2<f64>) -> Vector2<f64> {
        self.base.whiten(residual)
    }

    fn distance(&self, residual: &Vector2<f64>) -> f64 {
        self.loss.evaluate(self.base.distance(residual))[0]
    }

    fn whiten_system(&self, jacobian: &mut Matrix2xX<f64>, residual: &mut Vector2<f64>) {
        self.base.whiten_system(jacobian, residual);
        let [_, rho_prime, _] = self.loss.evaluate(residual.norm_squared());
        let weight = rho_prime.max(0.0).sqrt();
        *jacobian *= weight;
        *residual *= weight;
    }

    fn loss(&self) -> Option<&dyn Loss> {
        Some(&self.loss)
    }
}
