//! SE(3) - Special Euclidean Group in 3D
//!
//! Rigid body transformations (rotation + translation). Tangent elements are
//! ordered `[ρ, θ]`: translational part first, rotational part second.

use crate::manifold::so3::{SO3, SO3Tangent};
use crate::manifold::{LieGroup, Tangent, skew_symmetric};
use nalgebra::{Matrix3, Matrix4, Matrix6, UnitQuaternion, Vector3, Vector6};
use std::fmt;

/// SE(3) group element representing a rigid body transformation.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

/// SE(3) tangent space element `[ρ, θ]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl SE3 {
    /// Create a new SE3 element from translation and rotation.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::new(rotation),
            translation,
        }
    }

    /// Create SE3 from translation components and Euler angles.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Create SE3 from SO3 and Vector3 components.
    pub fn from_translation_so3(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Get the translation part.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Get the rotation part as SO3.
    pub fn rotation_so3(&self) -> &SO3 {
        &self.rotation
    }

    /// Get the 3×3 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    /// Get the 4×4 homogeneous transformation matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    /// Express a world point in this frame: g⁻¹ ⊙ p = Rᵀ(p - t).
    pub fn transform_to(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse().act(&(point - self.translation))
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;

    fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// M⁻¹ = [ Rᵀ  -Rᵀt ]
    ///       [ 0     1  ]
    fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let translation = -rotation.act(&self.translation);
        SE3::from_translation_so3(translation, rotation)
    }

    /// M_a M_b = [ R_a R_b   R_a t_b + t_a ]
    ///           [ 0               1       ]
    fn compose(&self, other: &Self) -> Self {
        SE3::from_translation_so3(
            self.rotation.act(&other.translation) + self.translation,
            self.rotation.compose(&other.rotation),
        )
    }

    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(vector) + self.translation
    }

    /// Ad(M) = [ R  [t]ₓR ]
    ///         [ 0    R   ]
    fn adjoint(&self) -> Matrix6<f64> {
        let r = self.rotation_matrix();
        let mut adjoint = Matrix6::zeros();
        adjoint.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        adjoint.fixed_view_mut::<3, 3>(3, 3).copy_from(&r);
        adjoint
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(skew_symmetric(&self.translation) * r));
        adjoint
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.matrix() - other.matrix()).amax() <= tolerance
    }
}

impl SE3Tangent {
    /// Create a tangent element from translational and rotational parts.
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        let mut data = Vector6::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&rho);
        data.fixed_rows_mut::<3>(3).copy_from(&theta);
        SE3Tangent { data }
    }

    /// Create a tangent element from its 6-vector `[ρ, θ]`.
    pub fn from_vector(data: Vector6<f64>) -> Self {
        SE3Tangent { data }
    }

    /// Translational part ρ.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Rotational part θ.
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }
}

impl Tangent<SE3> for SE3Tangent {
    /// exp([ρ, θ]) = [ Exp(θ)  V(θ)ρ ]
    ///               [   0       1   ]
    fn exp(&self) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let translation = theta.left_jacobian() * self.rho();
        SE3::from_translation_so3(translation, theta.exp())
    }
}
