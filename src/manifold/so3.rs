//! SO(3) - Special Orthogonal Group in 3D
//!
//! Rotations are stored as unit quaternions; tangent elements are axis-angle
//! vectors θ ∈ ℝ³.

use crate::manifold::{LieGroup, Tangent, skew_symmetric};
use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use std::fmt;

/// SO(3) group element representing a 3D rotation.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl fmt::Display for SO3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.quaternion;
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

/// SO(3) tangent space element (axis-angle vector).
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl SO3 {
    /// Create a new SO3 element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO3 from Euler angles (roll, pitch, yaw).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO3 from an axis-angle vector.
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent::new(axis_angle).exp()
    }

    /// Get the underlying unit quaternion.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the 3×3 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn inverse(&self) -> Self {
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * vector
    }

    /// For SO(3) the adjoint is the rotation matrix itself.
    fn adjoint(&self) -> Matrix3<f64> {
        self.rotation_matrix()
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.rotation_matrix() - other.rotation_matrix()).amax() <= tolerance
    }
}

impl SO3Tangent {
    /// Create a tangent element from an axis-angle vector.
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    /// Axis-angle coefficients.
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Hat map: θ → [θ]ₓ.
    pub fn hat(&self) -> Matrix3<f64> {
        skew_symmetric(&self.data)
    }

    /// V(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    ///
    /// Couples rotation and translation in the SE(3) exponential map.
    pub fn left_jacobian(&self) -> Matrix3<f64> {
        let angle_squared = self.data.norm_squared();
        let skew = self.hat();

        if angle_squared <= f64::EPSILON {
            Matrix3::identity() + 0.5 * skew
        } else {
            let theta = angle_squared.sqrt();
            Matrix3::identity()
                + (1.0 - theta.cos()) / angle_squared * skew
                + (theta - theta.sin()) / (angle_squared * theta) * skew * skew
        }
    }
}

impl Tangent<SO3> for SO3Tangent {
    /// q = Exp(θu) = cos(θ/2) + u sin(θ/2)
    fn exp(&self) -> SO3 {
        let quaternion = if self.data.norm_squared() > f64::EPSILON {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };
        SO3 { quaternion }
    }
}
