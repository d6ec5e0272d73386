//! Orthonormal basis of the left null space of the point Jacobian.
//!
//! For the stacked point Jacobian E (2m×3) of full column rank, the SVD
//! `E = U Σ Vᵀ` with a full 2m×2m U splits U into the three columns spanning
//! range(E) and 2m−3 columns orthogonal to it. Those trailing columns form
//! Enull with
//!
//! ```text
//! Enullᵀ Enull = I,   Enullᵀ E = 0,   Enull Enullᵀ = I - E (EᵀE)⁻¹ Eᵀ
//! ```
//!
//! so projecting F and b with Enull eliminates the point without inverting EᵀE.

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::linalg::point_covariance::ConditioningPolicy;
use nalgebra::{DMatrix, MatrixXx3};
use tracing::debug;

// 0 means no iteration limit.
const SVD_MAX_ITERATIONS: usize = 0;

/// Compute Enull (2m×(2m−3)) for a full-rank point Jacobian.
pub fn null_space_basis(
    e: &MatrixXx3<f64>,
    policy: &ConditioningPolicy,
) -> SmartFactorResult<DMatrix<f64>> {
    policy.validate()?;
    let rows = e.nrows();
    if rows <= 3 {
        return Err(SmartFactorError::DegenerateConfiguration(format!(
            "null space of a {rows}×3 point Jacobian is empty"
        )));
    }
    if e.iter().any(|v| !v.is_finite()) {
        return Err(SmartFactorError::DegenerateConfiguration(
            "point Jacobian contains non-finite entries".to_string(),
        ));
    }

    // Zero-padding to a square matrix yields the full U from a thin SVD.
    let mut padded = DMatrix::zeros(rows, rows);
    padded.columns_mut(0, 3).copy_from(e);

    let svd = padded
        .try_svd(true, false, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or_else(|| {
            SmartFactorError::DegenerateConfiguration(
                "SVD of point Jacobian did not converge".to_string(),
            )
        })?;
    let u = svd.u.ok_or_else(|| {
        SmartFactorError::DegenerateConfiguration(
            "SVD did not return left singular vectors".to_string(),
        )
    })?;

    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let largest = svd.singular_values[order[0]];
    let third = svd.singular_values[order[2]];
    // Same relative test as the point covariance, on eigenvalues of EᵀE = σ².
    policy.check_rank(third * third, largest * largest)?;

    let basis = DMatrix::from_fn(rows, rows - 3, |r, c| u[(r, order[c + 3])]);
    debug!("Null space basis: {}×{}", basis.nrows(), basis.ncols());
    Ok(basis)
}

/// Orthogonal projector `Enull Enullᵀ` onto the complement of range(E).
pub fn projector(e_null: &DMatrix<f64>) -> DMatrix<f64> {
    e_null * e_null.transpose()
}
