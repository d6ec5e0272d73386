//! Jacobian factor projected onto the null space of the point Jacobian.
//!
//! With Enull orthonormal and orthogonal to E, the reduced least-squares
//! problem over the views is
//!
//! ```text
//! error(x) = 0.5 · ‖Enullᵀ (F x - b)‖²
//! ```
//!
//! Its information matrix `FᵀEnull·EnullᵀF` equals the undamped Schur
//! complement, without ever inverting EᵀE.

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::hessian_factor::check_perturbation;
use crate::factors::measurement::Key;
use crate::linalg::schur::stack_view_blocks;
use nalgebra::{DMatrix, DVector, SMatrix};

#[derive(Debug, Clone, PartialEq)]
pub struct NullSpaceJacobianFactor<const D: usize> {
    keys: Vec<Key>,
    f_blocks: Vec<SMatrix<f64, 2, D>>,
    e_null: DMatrix<f64>,
    b: DVector<f64>,
}

impl<const D: usize> NullSpaceJacobianFactor<D> {
    pub fn new(
        keys: Vec<Key>,
        f_blocks: Vec<SMatrix<f64, 2, D>>,
        e_null: DMatrix<f64>,
        b: DVector<f64>,
    ) -> SmartFactorResult<Self> {
        let m = keys.len();
        if f_blocks.len() != m || e_null.nrows() != 2 * m || b.len() != 2 * m {
            return Err(SmartFactorError::InvalidArgument(format!(
                "{} keys, {} F blocks, Enull with {} rows, b with {} rows",
                m,
                f_blocks.len(),
                e_null.nrows(),
                b.len()
            )));
        }
        Ok(Self {
            keys,
            f_blocks,
            e_null,
            b,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn dim(&self) -> usize {
        D * self.keys.len()
    }

    pub fn f_blocks(&self) -> &[SMatrix<f64, 2, D>] {
        &self.f_blocks
    }

    pub fn e_null(&self) -> &DMatrix<f64> {
        &self.e_null
    }

    /// Reduced system (A, rhs) = (EnullᵀF, Enullᵀb), (2m−3)×Dm and 2m−3.
    pub fn whitened_system(&self) -> (DMatrix<f64>, DVector<f64>) {
        let e_null_t = self.e_null.transpose();
        let a = &e_null_t * stack_view_blocks(&self.f_blocks);
        let rhs = &e_null_t * &self.b;
        (a, rhs)
    }

    /// AᵀA.
    pub fn information(&self) -> DMatrix<f64> {
        let (a, _) = self.whitened_system();
        a.transpose() * a
    }

    /// Aᵀ rhs.
    pub fn linear_term(&self) -> DVector<f64> {
        let (a, rhs) = self.whitened_system();
        a.transpose() * rhs
    }

    pub fn gradient_at_zero(&self) -> DVector<f64> {
        -self.linear_term()
    }

    /// ‖Ax‖² - 2(Aᵀrhs)ᵀx.
    pub fn quadratic_form(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        check_perturbation(x, self.dim())?;
        let (a, rhs) = self.whitened_system();
        let ax = &a * x;
        Ok(ax.norm_squared() - 2.0 * rhs.dot(&ax))
    }

    pub fn error(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        check_perturbation(x, self.dim())?;
        let (a, rhs) = self.whitened_system();
        Ok(0.5 * (a * x - rhs).norm_squared())
    }
}
