//! Matrix-free Schur complement factor.
//!
//! Keeps the whitened F blocks, E, the point covariance P and b, and applies
//! the reduced Hessian `G = Fᵀ(I - E·P·Eᵀ)F` on demand. Suited to iterative
//! solvers and to points observed by many views.

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::hessian_factor::{RegularHessianFactor, check_perturbation, view_segment};
use crate::factors::measurement::Key;
use crate::linalg::schur::schur_complement_block_sparse;
use nalgebra::{DVector, Matrix3, MatrixXx3, SMatrix, SVector, Vector2, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitSchurFactor<const D: usize> {
    keys: Vec<Key>,
    f_blocks: Vec<SMatrix<f64, 2, D>>,
    e: MatrixXx3<f64>,
    point_covariance: Matrix3<f64>,
    b: DVector<f64>,
}

impl<const D: usize> ImplicitSchurFactor<D> {
    pub fn new(
        keys: Vec<Key>,
        f_blocks: Vec<SMatrix<f64, 2, D>>,
        e: MatrixXx3<f64>,
        point_covariance: Matrix3<f64>,
        b: DVector<f64>,
    ) -> SmartFactorResult<Self> {
        let m = keys.len();
        if f_blocks.len() != m || e.nrows() != 2 * m || b.len() != 2 * m {
            return Err(SmartFactorError::InvalidArgument(format!(
                "{} keys, {} F blocks, E with {} rows, b with {} rows",
                m,
                f_blocks.len(),
                e.nrows(),
                b.len()
            )));
        }
        Ok(Self {
            keys,
            f_blocks,
            e,
            point_covariance,
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

    pub fn e(&self) -> &MatrixXx3<f64> {
        &self.e
    }

    pub fn point_covariance(&self) -> &Matrix3<f64> {
        &self.point_covariance
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    fn e_block(&self, view: usize) -> SMatrix<f64, 2, 3> {
        self.e.fixed_rows::<2>(2 * view).into_owned()
    }

    fn b_block(&self, view: usize) -> Vector2<f64> {
        self.b.fixed_rows::<2>(2 * view).into_owned()
    }

    /// (I - E·P·Eᵀ) applied to a stacked 2m vector given by view blocks.
    fn project_out_point(&self, blocks: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
        let mut e_t_d = Vector3::zeros();
        for (i, d) in blocks.iter().enumerate() {
            e_t_d += self.e_block(i).transpose() * d;
        }
        let z = self.point_covariance * e_t_d;
        blocks
            .iter()
            .enumerate()
            .map(|(i, d)| d - self.e_block(i) * z)
            .collect()
    }

    /// y = G x without forming G.
    pub fn multiply_hessian(&self, x: &DVector<f64>) -> SmartFactorResult<DVector<f64>> {
        check_perturbation(x, self.dim())?;
        let fx: Vec<Vector2<f64>> = self
            .f_blocks
            .iter()
            .enumerate()
            .map(|(i, f)| f * view_segment::<D>(x, i))
            .collect();
        let projected = self.project_out_point(&fx);

        let mut y = DVector::zeros(self.dim());
        for (i, (f, d)) in self.f_blocks.iter().zip(&projected).enumerate() {
            y.rows_mut(i * D, D).copy_from(&(f.transpose() * d));
        }
        Ok(y)
    }

    /// Diagonal blocks G_ii = F_iᵀ(F_i - E_i·P·E_iᵀ·F_i).
    pub fn hessian_diagonal(&self) -> Vec<SMatrix<f64, D, D>> {
        self.f_blocks
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let e_i = self.e_block(i);
                let s = e_i * self.point_covariance * e_i.transpose();
                f.transpose() * (f - s * f)
            })
            .collect()
    }

    /// -g with g = Fᵀ(I - E·P·Eᵀ)b.
    pub fn gradient_at_zero(&self) -> DVector<f64> {
        let b_blocks: Vec<Vector2<f64>> = (0..self.keys.len()).map(|i| self.b_block(i)).collect();
        let projected = self.project_out_point(&b_blocks);

        let mut gradient = DVector::zeros(self.dim());
        for (i, (f, d)) in self.f_blocks.iter().zip(&projected).enumerate() {
            let g: SVector<f64, D> = f.transpose() * d;
            gradient.rows_mut(i * D, D).copy_from(&(-g));
        }
        gradient
    }

    /// xᵀGx - 2gᵀx.
    pub fn quadratic_form(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        let gx = self.multiply_hessian(x)?;
        Ok(x.dot(&gx) + 2.0 * self.gradient_at_zero().dot(x))
    }

    /// 0.5·(eᵀe - eᵀE·P·Eᵀe) with e = Fx - b.
    pub fn error(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        check_perturbation(x, self.dim())?;
        let mut e_t_residual = Vector3::zeros();
        let mut squared = 0.0;
        for (i, f) in self.f_blocks.iter().enumerate() {
            let residual = f * view_segment::<D>(x, i) - self.b_block(i);
            squared += residual.norm_squared();
            e_t_residual += self.e_block(i).transpose() * residual;
        }
        Ok(0.5 * (squared - e_t_residual.dot(&(self.point_covariance * e_t_residual))))
    }

    /// Explicit block Hessian with constant f = ‖b‖².
    pub fn to_hessian_factor(&self) -> SmartFactorResult<RegularHessianFactor<D>> {
        let schur = schur_complement_block_sparse(
            &self.f_blocks,
            &self.e,
            &self.point_covariance,
            &self.b,
        )?;
        RegularHessianFactor::new(self.keys.clone(), schur, self.b.norm_squared())
    }
}
