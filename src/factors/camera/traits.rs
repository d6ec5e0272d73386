//! Core traits and types for camera projection.

use super::CameraModelError;
use crate::manifold::se3::SE3;
use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};
use std::fmt::Debug;

/// Trait for intrinsic camera models.
///
/// All methods take points in the camera coordinate frame (right-handed,
/// Z-axis pointing forward). Derivatives are only meaningful for points that
/// [`CameraModel::project`] accepts.
pub trait CameraModel: Send + Sync + Clone + Debug + 'static {
    /// Number of intrinsic parameters.
    const INTRINSIC_DIM: usize;

    /// Project a point in camera frame to pixel coordinates.
    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Jacobian ∂(u,v)/∂(x,y,z) of the projection w.r.t. the camera-frame point.
    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64>;

    /// Jacobian ∂(u,v)/∂(intrinsics), 2×INTRINSIC_DIM.
    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64>;

    /// Intrinsic parameters as a vector, in the column order of
    /// [`CameraModel::jacobian_intrinsics`].
    fn intrinsics_vec(&self) -> DVector<f64>;

    /// Rebuild the model from a parameter slice.
    fn from_params(params: &[f64]) -> Result<Self, CameraModelError>;
}

/// Projection of a world point with all derivatives at the current estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Predicted pixel coordinates.
    pub uv: Vector2<f64>,
    /// Derivative w.r.t. a right perturbation `[ρ, θ]` of the camera pose.
    pub d_pose: SMatrix<f64, 2, 6>,
    /// Derivative w.r.t. the world point.
    pub d_point: Matrix2x3<f64>,
    /// Derivative w.r.t. the calibration parameters.
    pub d_calibration: Matrix2xX<f64>,
}

/// A posed camera that can project world points.
///
/// The pose is camera-in-world: a world point `p` maps to the camera frame as
/// `Rᵀ(p - t)`.
pub trait Camera: Send + Sync + Clone + Debug {
    /// Number of calibration parameters a factor may optimize jointly with the pose.
    const CALIBRATION_DIM: usize;

    /// Camera-in-world pose.
    fn pose(&self) -> &SE3;

    /// Same calibration, different pose.
    fn with_pose(&self, pose: SE3) -> Self;

    /// Project a world point to pixel coordinates.
    fn project(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Project a world point and compute pose, point and calibration derivatives.
    fn project_with_jacobians(&self, point: &Vector3<f64>)
    -> Result<Projection, CameraModelError>;
}
