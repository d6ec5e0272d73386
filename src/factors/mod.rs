//! Smart factors and their collaborators.
//!
//! # Module Structure
//!
//! - `measurement`: per-view observations and SfM tracks
//! - `camera`: camera projection capability and the pinhole reference model
//! - `noise_model`: whitening capability (Gaussian and robust)
//! - `reprojection`: residuals and whitened Jacobians of a smart factor
//! - `smart_factor`: the factor, its configuration and `linearize`
//! - `hessian_factor`, `implicit_schur_factor`, `null_space_factor`: the three
//!   linearized representations

pub mod camera;
pub mod hessian_factor;
pub mod implicit_schur_factor;
pub mod measurement;
pub mod noise_model;
pub mod null_space_factor;
pub mod reprojection;
pub mod smart_factor;

pub use hessian_factor::RegularHessianFactor;
pub use implicit_schur_factor::ImplicitSchurFactor;
pub use measurement::{Key, Measurement, MeasurementSet, SfmTrack};
pub use noise_model::{
    DiagonalNoise, GaussianNoise, IsotropicNoise, NoiseModel, RobustNoise, SharedNoiseModel,
};
pub use null_space_factor::NullSpaceJacobianFactor;
pub use reprojection::{
    DenseJacobians, DenseNullSpaceJacobians, JacobianBlocks, NullSpaceBlocks, POSE_DIM,
};
pub use smart_factor::{
    FactorRepresentation, LinearizedSmartFactor, SmartFactor, SmartFactorConfig,
};
