//! Linear algebra for point elimination.
//!
//! - [`point_covariance`]: damped inversion of EᵀE with a rank/condition policy
//! - [`schur`]: dense and block-sparse Schur complement
//! - [`null_space`]: SVD basis orthogonal to the point Jacobian
//! - [`conversions`]: sparse export using faer

pub mod null_space;
pub mod point_covariance;
pub mod schur;

pub use null_space::{null_space_basis, projector};
pub use point_covariance::{ConditioningPolicy, DampingMode, point_covariance};
pub use schur::{SchurComplement, SchurMethod, eliminate_point};

/// Type alias for sparse matrices using faer
pub type SparseMatrix = faer::sparse::SparseColMat<usize, f64>;

pub mod conversions {
    use super::SparseMatrix;
    use crate::error::{SmartFactorError, SmartFactorResult};
    use faer::sparse::{SparseColMat, Triplet};

    /// Create sparse matrix from triplets using faer
    pub fn triplets_to_sparse(
        rows: usize,
        cols: usize,
        triplets: &[Triplet<usize, usize, f64>],
    ) -> SmartFactorResult<SparseMatrix> {
        SparseColMat::try_new_from_triplets(rows, cols, triplets).map_err(|e| {
            SmartFactorError::SparseMatrix(format!("Failed to create sparse matrix: {:?}", e))
        })
    }
}
