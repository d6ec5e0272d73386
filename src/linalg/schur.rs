//! Point elimination by Schur complement.
//!
//! Given whitened per-view blocks `F_i` (2×D), the stacked point Jacobian E
//! (2m×3), the residual b (2m) and the point covariance P, the reduced system
//! over the view variables is
//!
//! ```text
//! G = Fᵀ(F - E·P·EᵀF)
//! g = Fᵀ(b - E·P·Eᵀb)
//! ```
//!
//! [`schur_complement_dense`] builds the full 2m×Dm F and slices the result.
//! [`schur_complement_block_sparse`] works per view pair with the 2×2 blocks
//! `S = E_i·P·E_jᵀ`:
//!
//! ```text
//! G_ii = F_iᵀ(F_i - S_ii·F_i)
//! G_ij = -F_iᵀ·S_ij·F_j            (j > i)
//! g_i  = F_iᵀb_i - Σ_j F_iᵀ·S_ij·b_j
//! ```
//!
//! Both fill the same layout: upper-triangular blocks in row-major pair order
//! (m(m+1)/2 entries) and one linear term per view.

use crate::error::{SmartFactorError, SmartFactorResult};
use nalgebra::{DMatrix, DVector, Matrix2x3, Matrix3, MatrixXx3, SMatrix, SVector, Vector2};
use tracing::trace;

/// Largest view count for which [`SchurMethod::Auto`] uses the dense path.
pub const AUTO_DENSE_MAX_VIEWS: usize = 3;

/// Elimination algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchurMethod {
    /// Materialize F and use dense products.
    Dense,
    /// Per view pair 2×2 products.
    #[default]
    BlockSparse,
    /// Dense up to [`AUTO_DENSE_MAX_VIEWS`] views, block-sparse beyond.
    Auto,
}

impl SchurMethod {
    /// Resolve `Auto` for a given view count.
    pub fn resolve(self, num_views: usize) -> SchurMethod {
        match self {
            SchurMethod::Auto if num_views <= AUTO_DENSE_MAX_VIEWS => SchurMethod::Dense,
            SchurMethod::Auto => SchurMethod::BlockSparse,
            other => other,
        }
    }
}

/// Reduced quadratic term over the view variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SchurComplement<const D: usize> {
    /// Blocks G_ij for i ≤ j, row-major over pairs.
    pub hessian_blocks: Vec<SMatrix<f64, D, D>>,
    /// Linear terms g_i by view position.
    pub linear_terms: Vec<SVector<f64, D>>,
}

/// Position of pair (i, j), i ≤ j, in the row-major upper-triangular layout.
#[inline]
pub fn upper_block_index(num_views: usize, i: usize, j: usize) -> usize {
    i * (2 * num_views - i - 1) / 2 + j
}

impl<const D: usize> SchurComplement<D> {
    pub fn num_views(&self) -> usize {
        self.linear_terms.len()
    }

    /// Block G_ij for any ordering of i and j.
    ///
    /// # Panics
    ///
    /// Panics if `i` or `j` is not a view position.
    pub fn block(&self, i: usize, j: usize) -> SMatrix<f64, D, D> {
        let m = self.num_views();
        assert!(i < m && j < m, "view index out of range: ({i}, {j}) with {m} views");
        if i <= j {
            self.hessian_blocks[upper_block_index(m, i, j)]
        } else {
            self.hessian_blocks[upper_block_index(m, j, i)].transpose()
        }
    }

    /// Full symmetric Dm×Dm matrix G and Dm vector g.
    pub fn to_dense(&self) -> (DMatrix<f64>, DVector<f64>) {
        let m = self.num_views();
        let mut information = DMatrix::zeros(m * D, m * D);
        let mut linear = DVector::zeros(m * D);
        for i in 0..m {
            linear.rows_mut(i * D, D).copy_from(&self.linear_terms[i]);
            for j in 0..m {
                information
                    .view_mut((i * D, j * D), (D, D))
                    .copy_from(&self.block(i, j));
            }
        }
        (information, linear)
    }
}

fn check_dimensions<const D: usize>(
    f_blocks: &[SMatrix<f64, 2, D>],
    e: &MatrixXx3<f64>,
    b: &DVector<f64>,
) -> SmartFactorResult<()> {
    let m = f_blocks.len();
    if m == 0 {
        return Err(SmartFactorError::InvalidArgument(
            "cannot eliminate a point without views".to_string(),
        ));
    }
    if e.nrows() != 2 * m || b.len() != 2 * m {
        return Err(SmartFactorError::InvalidArgument(format!(
            "block size mismatch: {} views, E has {} rows, b has {} rows",
            m,
            e.nrows(),
            b.len()
        )));
    }
    Ok(())
}

/// Stack per-view blocks into the block-diagonal 2m×Dm F.
pub fn stack_view_blocks<const D: usize>(f_blocks: &[SMatrix<f64, 2, D>]) -> DMatrix<f64> {
    let m = f_blocks.len();
    let mut f = DMatrix::zeros(2 * m, D * m);
    for (i, block) in f_blocks.iter().enumerate() {
        f.view_mut((2 * i, D * i), (2, D)).copy_from(block);
    }
    f
}

/// Eliminate the point with the selected algorithm.
pub fn eliminate_point<const D: usize>(
    method: SchurMethod,
    f_blocks: &[SMatrix<f64, 2, D>],
    e: &MatrixXx3<f64>,
    point_covariance: &Matrix3<f64>,
    b: &DVector<f64>,
) -> SmartFactorResult<SchurComplement<D>> {
    let resolved = method.resolve(f_blocks.len());
    trace!(
        "Eliminating point from {} views with {:?} Schur complement",
        f_blocks.len(),
        resolved
    );
    match resolved {
        SchurMethod::Dense => schur_complement_dense(f_blocks, e, point_covariance, b),
        _ => schur_complement_block_sparse(f_blocks, e, point_covariance, b),
    }
}

/// Dense Schur complement on the materialized 2m×Dm F.
pub fn schur_complement_dense<const D: usize>(
    f_blocks: &[SMatrix<f64, 2, D>],
    e: &MatrixXx3<f64>,
    point_covariance: &Matrix3<f64>,
    b: &DVector<f64>,
) -> SmartFactorResult<SchurComplement<D>> {
    check_dimensions(f_blocks, e, b)?;
    let m = f_blocks.len();
    let f = stack_view_blocks(f_blocks);

    // Q F and Q b with Q = I - E P Eᵀ, without forming Q.
    let e_t_f = e.transpose() * &f;
    let e_t_b = e.transpose() * b;
    let projected_f = &f - e * (point_covariance * e_t_f);
    let projected_b = b - e * (point_covariance * e_t_b);

    let f_t = f.transpose();
    let h = &f_t * projected_f;
    let g = &f_t * projected_b;

    let mut hessian_blocks = Vec::with_capacity(m * (m + 1) / 2);
    let mut linear_terms = Vec::with_capacity(m);
    for i in 0..m {
        for j in i..m {
            hessian_blocks.push(SMatrix::<f64, D, D>::from_fn(|r, c| h[(i * D + r, j * D + c)]));
        }
        linear_terms.push(SVector::<f64, D>::from_fn(|r, _| g[i * D + r]));
    }

    Ok(SchurComplement {
        hessian_blocks,
        linear_terms,
    })
}

/// Block-sparse Schur complement; never materializes F.
pub fn schur_complement_block_sparse<const D: usize>(
    f_blocks: &[SMatrix<f64, 2, D>],
    e: &MatrixXx3<f64>,
    point_covariance: &Matrix3<f64>,
    b: &DVector<f64>,
) -> SmartFactorResult<SchurComplement<D>> {
    check_dimensions(f_blocks, e, b)?;
    let m = f_blocks.len();

    let e_blocks: Vec<Matrix2x3<f64>> = (0..m)
        .map(|i| e.fixed_rows::<2>(2 * i).into_owned())
        .collect();
    let b_blocks: Vec<Vector2<f64>> = (0..m)
        .map(|i| b.fixed_rows::<2>(2 * i).into_owned())
        .collect();

    let mut hessian_blocks = Vec::with_capacity(m * (m + 1) / 2);
    let mut linear_terms = Vec::with_capacity(m);

    for i1 in 0..m {
        let f1_t = f_blocks[i1].transpose();
        let e1_p = e_blocks[i1] * point_covariance;
        let mut linear = f1_t * b_blocks[i1];

        for i2 in 0..m {
            let s = e1_p * e_blocks[i2].transpose();
            linear -= f1_t * (s * b_blocks[i2]);

            if i2 == i1 {
                hessian_blocks.push(f1_t * (f_blocks[i1] - s * f_blocks[i1]));
            } else if i2 > i1 {
                hessian_blocks.push(-(f1_t * (s * f_blocks[i2])));
            }
        }
        linear_terms.push(linear);
    }

    Ok(SchurComplement {
        hessian_blocks,
        linear_terms,
    })
}
