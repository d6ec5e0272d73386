//! Camera projection capability used by the smart factors.
//!
//! Two abstractions are kept apart:
//!
//! 1. **[`CameraModel`]**: intrinsics only. Projects a point expressed in the
//!    camera frame and differentiates with respect to that point and to the
//!    intrinsic parameters.
//! 2. **[`Camera`]**: a posed camera. Projects world points and returns the
//!    2×6 pose, 2×3 point and 2×CALIBRATION_DIM calibration derivatives the
//!    factors stack into their F and E blocks.
//!
//! [`PerspectiveCamera`] combines an SE(3) camera-in-world pose with any
//! [`CameraModel`]; [`PinholeCalibration`] is the reference intrinsics model.
//!
//! # Example
//!
//! ```
//! use apex_smart_factors::factors::camera::{Camera, PerspectiveCamera, PinholeCalibration};
//! use apex_smart_factors::manifold::LieGroup;
//! use apex_smart_factors::manifold::se3::SE3;
//! use nalgebra::Vector3;
//!
//! let calibration = PinholeCalibration::new(500.0, 500.0, 320.0, 240.0).unwrap();
//! let camera = PerspectiveCamera::new(SE3::identity(), calibration);
//! let uv = camera.project(&Vector3::new(0.1, 0.2, 1.0)).unwrap();
//! assert!((uv.x - 370.0).abs() < 1e-10);
//! ```

pub mod pinhole;
pub mod traits;

pub use pinhole::{PINHOLE_INTRINSIC_DIM, PerspectiveCamera, PinholeCalibration};
pub use traits::{Camera, CameraModel, Projection};

/// Minimum depth along the optical axis for a valid projection.
pub const MIN_DEPTH: f64 = 1e-6;

/// Camera model errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraModelError {
    #[error("Point is behind the camera (depth {depth})")]
    PointBehindCamera { depth: f64 },
    #[error("Projection is not finite")]
    NonFiniteProjection,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
}
