//! # Apex Smart Factors
//!
//! Structureless ("smart") landmark factors for bundle adjustment and visual SLAM.
//! A smart factor keeps the image observations of one landmark and, at each
//! linearization point, eliminates the landmark by a Schur complement so the
//! optimizer only sees a quadratic term over the observing views.
//!
//! ## Features
//!
//! - **Whitened residuals and Jacobians** per view, with an optional body-to-sensor extrinsic
//! - **Dense and block-sparse Schur complements** behind one entry point
//! - **SVD null-space elimination** without inverting the point normal matrix
//! - **Three output representations**: block Hessian, matrix-free Schur, null-space Jacobian
//! - **Typed failures** for cheirality, degenerate geometry and invalid input
//!
//! ## Pipeline
//!
//! ```text
//! MeasurementSet → reprojection (F, E, b) → {Schur | null space} → LinearizedSmartFactor
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
pub mod logger;
pub mod manifold;

pub use error::{SmartFactorError, SmartFactorResult};
pub use factors::camera::{
    Camera, CameraModel, CameraModelError, PerspectiveCamera, PinholeCalibration,
};
pub use factors::{
    FactorRepresentation, Key, LinearizedSmartFactor, SmartFactor, SmartFactorConfig,
};
pub use linalg::{ConditioningPolicy, DampingMode, SchurMethod};
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroup, Tangent, se3::SE3, so3::SO3};
