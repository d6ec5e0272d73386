//! Lie group types for camera poses.
//!
//! Poses of views (and the optional sensor-in-body extrinsic) are SE(3)
//! elements. Perturbations follow the right-plus convention of the
//! [manif](https://github.com/artivis/manif) library:
//!
//! ```text
//! g ⊞ τ = g ∘ exp(τ^∧),   τ = [ρ, θ] for SE(3)
//! ```
//!
//! so every 2×6 pose Jacobian produced by the camera models is a derivative
//! with respect to `[ρ, θ]` in the tangent space at the current pose.
//!
//! # Example
//!
//! ```
//! use apex_smart_factors::manifold::LieGroup;
//! use apex_smart_factors::manifold::se3::{SE3, SE3Tangent};
//! use nalgebra::Vector3;
//!
//! let pose = SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.1, 0.0);
//! let delta = SE3Tangent::new(Vector3::new(0.01, 0.0, 0.0), Vector3::zeros());
//! let perturbed = pose.plus(&delta);
//! assert!((perturbed.translation() - pose.translation()).norm() > 0.0);
//! ```

use nalgebra::Vector3;
use std::fmt::Debug;

pub mod se3;
pub mod so3;

/// Core trait for the Lie group operations needed by the projection models.
pub trait LieGroup: Clone + Debug + PartialEq {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// The adjoint / Jacobian matrix type
    type JacobianMatrix: Clone + Debug + PartialEq;

    /// Get the identity element of the group.
    fn identity() -> Self;

    /// Compute the inverse g⁻¹ such that g ∘ g⁻¹ = e.
    fn inverse(&self) -> Self;

    /// Compose this element with another (group multiplication g₁ ∘ g₂).
    fn compose(&self, other: &Self) -> Self;

    /// Act on a vector v: g ⊙ v.
    fn act(&self, vector: &Vector3<f64>) -> Vector3<f64>;

    /// Adjoint matrix Ad(g), satisfying g ∘ exp(τ^∧) ∘ g⁻¹ = exp((Ad(g) τ)^∧).
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Right plus operation: g ⊞ τ = g ∘ exp(τ^∧).
    fn right_plus(&self, tangent: &Self::TangentVector) -> Self {
        self.compose(&tangent.exp())
    }

    /// Convenience method for right_plus.
    fn plus(&self, tangent: &Self::TangentVector) -> Self {
        self.right_plus(tangent)
    }

    /// Element-wise comparison of the homogeneous representation.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;
}

/// Trait for Lie algebra (tangent space) elements.
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// Exponential map to the Lie group: exp(τ^∧).
    fn exp(&self) -> G;
}

/// Compute skew-symmetric matrix from a 3D vector.
///
/// ```text
/// [  0  -vz   vy ]
/// [ vz    0  -vx ]
/// [-vy   vx    0 ]
/// ```
#[inline]
pub fn skew_symmetric(v: &Vector3<f64>) -> nalgebra::Matrix3<f64> {
    nalgebra::Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
