//! Error types for the apex-smart-factors library
//!
//! Every evaluation entry point returns a [`SmartFactorResult`]. Failures are
//! local to one factor evaluation: the caller decides whether to skip the
//! factor, down-weight it, or reject the linearization point.

use crate::factors::camera::CameraModelError;
use thiserror::Error;

/// Main result type used throughout the library
pub type SmartFactorResult<T> = Result<T, SmartFactorError>;

/// Main error type for smart factor evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SmartFactorError {
    /// A view cannot project the point at the current linearization point
    /// (cheirality or otherwise invalid geometry).
    #[error("Projection failure in view {view}: {source}")]
    ProjectionFailure {
        /// Position of the failing view in the factor's key order
        view: usize,
        #[source]
        source: CameraModelError,
    },

    /// The point-normal matrix (damped or not) is singular or ill-conditioned,
    /// or the stacked point Jacobian has insufficient rank.
    #[error("Degenerate configuration: {0}")]
    DegenerateConfiguration(String),

    /// Inconsistent inputs detected before any numerical work.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Sparse matrix assembly errors
    #[error("Sparse matrix error: {0}")]
    SparseMatrix(String),
}

impl SmartFactorError {
    /// True for failures caused by the linearization point rather than by the
    /// way the factor was built or called.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SmartFactorError::ProjectionFailure { .. }
                | SmartFactorError::DegenerateConfiguration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SmartFactorError::DegenerateConfiguration("rank 2".to_string());
        assert_eq!(error.to_string(), "Degenerate configuration: rank 2");

        let error = SmartFactorError::ProjectionFailure {
            view: 3,
            source: CameraModelError::PointBehindCamera { depth: -1.0 },
        };
        assert!(error.to_string().starts_with("Projection failure in view 3"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SmartFactorError::DegenerateConfiguration(String::new()).is_recoverable());
        assert!(!SmartFactorError::InvalidArgument(String::new()).is_recoverable());
        assert!(!SmartFactorError::SparseMatrix(String::new()).is_recoverable());
    }

    #[test]
    fn test_result_err() {
        let result: SmartFactorResult<i32> =
            Err(SmartFactorError::InvalidArgument("Test error".to_string()));
        assert!(result.is_err());
    }
}
