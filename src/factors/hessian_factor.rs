//! Dense block Hessian representation of an eliminated landmark.
//!
//! Stores the upper-triangular blocks G_ij, the linear terms g_i and the
//! constant f, and represents
//!
//! ```text
//! error(x) = 0.5 · (xᵀGx - 2gᵀx + f)
//! ```
//!
//! over the stacked view perturbation x (D entries per view, in key order).

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::measurement::Key;
use crate::linalg::SparseMatrix;
use crate::linalg::conversions::triplets_to_sparse;
use crate::linalg::schur::{SchurComplement, upper_block_index};
use faer::sparse::Triplet;
use nalgebra::{DMatrix, DVector, SMatrix, SVector};

pub(crate) fn check_perturbation(x: &DVector<f64>, expected: usize) -> SmartFactorResult<()> {
    if x.len() != expected {
        return Err(SmartFactorError::InvalidArgument(format!(
            "perturbation has {} entries, factor expects {}",
            x.len(),
            expected
        )));
    }
    Ok(())
}

pub(crate) fn view_segment<const D: usize>(x: &DVector<f64>, view: usize) -> SVector<f64, D> {
    SVector::<f64, D>::from_fn(|r, _| x[view * D + r])
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegularHessianFactor<const D: usize> {
    keys: Vec<Key>,
    hessian_blocks: Vec<SMatrix<f64, D, D>>,
    linear_terms: Vec<SVector<f64, D>>,
    constant: f64,
}

impl<const D: usize> RegularHessianFactor<D> {
    pub fn new(
        keys: Vec<Key>,
        schur: SchurComplement<D>,
        constant: f64,
    ) -> SmartFactorResult<Self> {
        let m = keys.len();
        if schur.linear_terms.len() != m || schur.hessian_blocks.len() != m * (m + 1) / 2 {
            return Err(SmartFactorError::InvalidArgument(format!(
                "{} keys but {} linear terms and {} Hessian blocks",
                m,
                schur.linear_terms.len(),
                schur.hessian_blocks.len()
            )));
        }
        Ok(Self {
            keys,
            hessian_blocks: schur.hessian_blocks,
            linear_terms: schur.linear_terms,
            constant,
        })
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn num_views(&self) -> usize {
        self.keys.len()
    }

    /// Dimension of the stacked perturbation.
    pub fn dim(&self) -> usize {
        D * self.keys.len()
    }

    /// Upper-triangular blocks in row-major pair order.
    pub fn hessian_blocks(&self) -> &[SMatrix<f64, D, D>] {
        &self.hessian_blocks
    }

    pub fn linear_terms(&self) -> &[SVector<f64, D>] {
        &self.linear_terms
    }

    /// The constant f (whitened squared residual at the linearization point).
    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    /// G_ij for any ordering of i and j.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not a view position.
    pub fn hessian_block(&self, i: usize, j: usize) -> SMatrix<f64, D, D> {
        let m = self.num_views();
        assert!(i < m && j < m, "view index out of range: ({i}, {j}) with {m} views");
        if i <= j {
            self.hessian_blocks[upper_block_index(m, i, j)]
        } else {
            self.hessian_blocks[upper_block_index(m, j, i)].transpose()
        }
    }

    /// Dense symmetric G.
    pub fn information(&self) -> DMatrix<f64> {
        let m = self.num_views();
        let mut information = DMatrix::zeros(self.dim(), self.dim());
        for i in 0..m {
            for j in 0..m {
                information
                    .view_mut((i * D, j * D), (D, D))
                    .copy_from(&self.hessian_block(i, j));
            }
        }
        information
    }

    /// Dense g.
    pub fn linear_term(&self) -> DVector<f64> {
        let mut linear = DVector::zeros(self.dim());
        for (i, g) in self.linear_terms.iter().enumerate() {
            linear.rows_mut(i * D, D).copy_from(g);
        }
        linear
    }

    /// Gradient of the error at x = 0, which is -g.
    pub fn gradient_at_zero(&self) -> DVector<f64> {
        -self.linear_term()
    }

    /// xᵀGx - 2gᵀx, evaluated block by block.
    pub fn quadratic_form(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        check_perturbation(x, self.dim())?;
        let m = self.num_views();
        let segments: Vec<SVector<f64, D>> = (0..m).map(|i| view_segment::<D>(x, i)).collect();

        let mut value = 0.0;
        let mut index = 0;
        for i in 0..m {
            for j in i..m {
                let term = segments[i].dot(&(self.hessian_blocks[index] * segments[j]));
                value += if i == j { term } else { 2.0 * term };
                index += 1;
            }
            value -= 2.0 * self.linear_terms[i].dot(&segments[i]);
        }
        Ok(value)
    }

    pub fn error(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        Ok(0.5 * (self.quadratic_form(x)? + self.constant))
    }

    /// Scatter G into a global sparse matrix.
    ///
    /// `offsets[i]` is the first global column of view i; the result is
    /// `dim × dim`. Both triangles are emitted.
    pub fn to_sparse_information(
        &self,
        offsets: &[usize],
        dim: usize,
    ) -> SmartFactorResult<SparseMatrix> {
        if offsets.len() != self.num_views() {
            return Err(SmartFactorError::InvalidArgument(format!(
                "{} offsets for {} views",
                offsets.len(),
                self.num_views()
            )));
        }
        if let Some(&offset) = offsets.iter().find(|&&o| o + D > dim) {
            return Err(SmartFactorError::InvalidArgument(format!(
                "view block at offset {offset} exceeds global dimension {dim}"
            )));
        }

        let m = self.num_views();
        let mut triplets = Vec::with_capacity(m * m * D * D);
        for i in 0..m {
            for j in 0..m {
                let block = self.hessian_block(i, j);
                for c in 0..D {
                    for r in 0..D {
                        triplets.push(Triplet::new(offsets[i] + r, offsets[j] + c, block[(r, c)]));
                    }
                }
            }
        }
        triplets_to_sparse(dim, dim, &triplets)
    }
}
