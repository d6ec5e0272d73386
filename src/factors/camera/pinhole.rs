//! Pinhole camera model (no distortion) and the posed perspective camera.

use super::traits::{Camera, CameraModel, Projection};
use super::{CameraModelError, MIN_DEPTH};
use crate::manifold::se3::SE3;
use crate::manifold::skew_symmetric;
use nalgebra::{DVector, Matrix2x3, Matrix2xX, SMatrix, Vector2, Vector3};

/// Number of intrinsic parameters for pinhole camera
pub const PINHOLE_INTRINSIC_DIM: usize = 4;

/// Pinhole intrinsics with 4 parameters.
///
/// For a point `p_cam = (x, y, z)` in camera frame:
/// ```text
/// u = fx * (x/z) + cx
/// v = fy * (y/z) + cy
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCalibration {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Principal point x coordinate (pixels)
    pub cx: f64,
    /// Principal point y coordinate (pixels)
    pub cy: f64,
}

impl PinholeCalibration {
    /// Create pinhole intrinsics with validation.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraModelError> {
        if !(fx > 0.0 && fy > 0.0 && fx.is_finite() && fy.is_finite()) {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !cx.is_finite() || !cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(Self { fx, fy, cx, cy })
    }
}

impl CameraModel for PinholeCalibration {
    const INTRINSIC_DIM: usize = PINHOLE_INTRINSIC_DIM;

    fn project(&self, p_cam: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        if p_cam.z < MIN_DEPTH {
            return Err(CameraModelError::PointBehindCamera { depth: p_cam.z });
        }
        let inv_z = 1.0 / p_cam.z;
        Ok(Vector2::new(
            self.fx * p_cam.x * inv_z + self.cx,
            self.fy * p_cam.y * inv_z + self.cy,
        ))
    }

    fn jacobian_point(&self, p_cam: &Vector3<f64>) -> Matrix2x3<f64> {
        let inv_z = 1.0 / p_cam.z;
        let x_norm = p_cam.x * inv_z;
        let y_norm = p_cam.y * inv_z;

        // u = fx * x/z + cx  =>  ∂u/∂x = fx/z, ∂u/∂z = -fx*x/z²
        // v = fy * y/z + cy  =>  ∂v/∂y = fy/z, ∂v/∂z = -fy*y/z²
        Matrix2x3::new(
            self.fx * inv_z,
            0.0,
            -self.fx * x_norm * inv_z,
            0.0,
            self.fy * inv_z,
            -self.fy * y_norm * inv_z,
        )
    }

    fn jacobian_intrinsics(&self, p_cam: &Vector3<f64>) -> Matrix2xX<f64> {
        let inv_z = 1.0 / p_cam.z;
        let x_norm = p_cam.x * inv_z;
        let y_norm = p_cam.y * inv_z;

        // ∂(u,v)/∂(fx,fy,cx,cy)
        let mut jacobian = Matrix2xX::zeros(PINHOLE_INTRINSIC_DIM);
        jacobian[(0, 0)] = x_norm;
        jacobian[(0, 2)] = 1.0;
        jacobian[(1, 1)] = y_norm;
        jacobian[(1, 3)] = 1.0;
        jacobian
    }

    fn intrinsics_vec(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.fx, self.fy, self.cx, self.cy])
    }

    fn from_params(params: &[f64]) -> Result<Self, CameraModelError> {
        match params {
            [fx, fy, cx, cy] => Self::new(*fx, *fy, *cx, *cy),
            _ => Err(CameraModelError::InvalidParams(format!(
                "pinhole calibration requires {} parameters, got {}",
                PINHOLE_INTRINSIC_DIM,
                params.len()
            ))),
        }
    }
}

/// A camera-in-world SE(3) pose paired with an intrinsics model.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera<K: CameraModel> {
    pose: SE3,
    calibration: K,
}

impl<K: CameraModel> PerspectiveCamera<K> {
    pub fn new(pose: SE3, calibration: K) -> Self {
        Self { pose, calibration }
    }

    pub fn calibration(&self) -> &K {
        &self.calibration
    }

    /// Same pose, different intrinsics.
    pub fn with_calibration(&self, calibration: K) -> Self {
        Self {
            pose: self.pose.clone(),
            calibration,
        }
    }
}

impl<K: CameraModel> Camera for PerspectiveCamera<K> {
    const CALIBRATION_DIM: usize = K::INTRINSIC_DIM;

    fn pose(&self) -> &SE3 {
        &self.pose
    }

    fn with_pose(&self, pose: SE3) -> Self {
        Self {
            pose,
            calibration: self.calibration.clone(),
        }
    }

    fn project(&self, point: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let p_cam = self.pose.transform_to(point);
        let uv = self.calibration.project(&p_cam)?;
        if !(uv.x.is_finite() && uv.y.is_finite()) {
            return Err(CameraModelError::NonFiniteProjection);
        }
        Ok(uv)
    }

    fn project_with_jacobians(
        &self,
        point: &Vector3<f64>,
    ) -> Result<Projection, CameraModelError> {
        let p_cam = self.pose.transform_to(point);
        let uv = self.project(point)?;

        let d_uv_d_pcam = self.calibration.jacobian_point(&p_cam);

        // p_cam = Rᵀ(p_world - t), pose perturbed on the right by [ρ, θ]:
        // p_cam' ≈ p_cam - ρ + [p_cam]ₓ θ
        let p_cam_skew = skew_symmetric(&p_cam);
        let d_pcam_d_pose = SMatrix::<f64, 3, 6>::from_fn(|r, c| {
            if c < 3 {
                if r == c { -1.0 } else { 0.0 }
            } else {
                p_cam_skew[(r, c - 3)]
            }
        });
        let r_transpose = self.pose.rotation_matrix().transpose();

        Ok(Projection {
            uv,
            d_pose: d_uv_d_pcam * d_pcam_d_pose,
            d_point: d_uv_d_pcam * r_transpose,
            d_calibration: self.calibration.jacobian_intrinsics(&p_cam),
        })
    }
}
