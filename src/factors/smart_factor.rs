//! Structureless landmark factor.
//!
//! A [`SmartFactor`] stores the image observations of one landmark and, at
//! every linearization point, eliminates the landmark so that only a
//! quadratic term over the observing views remains. The caller supplies the
//! cameras and a point estimate per call; nothing is cached between calls.
//!
//! # Example
//!
//! ```
//! use apex_smart_factors::factors::camera::{Camera, PerspectiveCamera, PinholeCalibration};
//! use apex_smart_factors::factors::noise_model::IsotropicNoise;
//! use apex_smart_factors::factors::smart_factor::{
//!     FactorRepresentation, SmartFactor, SmartFactorConfig,
//! };
//! use apex_smart_factors::manifold::se3::SE3;
//! use nalgebra::{DVector, Vector3};
//!
//! let calibration = PinholeCalibration::new(500.0, 500.0, 320.0, 240.0).unwrap();
//! let cameras: Vec<_> = [-1.0, 0.0, 1.0]
//!     .iter()
//!     .map(|x| {
//!         let pose = SE3::from_translation_euler(*x, 0.0, 0.0, 0.0, 0.0, 0.0);
//!         PerspectiveCamera::new(pose, calibration)
//!     })
//!     .collect();
//! let point = Vector3::new(0.2, -0.1, 5.0);
//!
//! let mut factor = SmartFactor::<6>::new();
//! let noise = IsotropicNoise::unit().shared();
//! for (key, camera) in cameras.iter().enumerate() {
//!     factor.add(camera.project(&point).unwrap(), key, noise.clone()).unwrap();
//! }
//!
//! let config = SmartFactorConfig::new().with_representation(FactorRepresentation::Hessian);
//! let linearized = factor.linearize(&cameras, &point, &config).unwrap();
//! assert_eq!(linearized.keys(), &[0, 1, 2]);
//! assert!(linearized.error(&DVector::zeros(18)).unwrap().abs() < 1e-12);
//! ```

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::camera::Camera;
use crate::factors::hessian_factor::RegularHessianFactor;
use crate::factors::implicit_schur_factor::ImplicitSchurFactor;
use crate::factors::measurement::{Key, MeasurementSet, SfmTrack};
use crate::factors::noise_model::SharedNoiseModel;
use crate::factors::null_space_factor::NullSpaceJacobianFactor;
use crate::linalg::point_covariance::{
    ConditioningPolicy, DEFAULT_CONDITION_THRESHOLD, DEFAULT_RANK_TOLERANCE, DampingMode,
    validate_lambda,
};
use crate::linalg::schur::{SchurMethod, eliminate_point};
use crate::manifold::LieGroup;
use crate::manifold::se3::SE3;
use nalgebra::{DVector, Vector2, Vector3};
use std::fmt;
use tracing::debug;

/// Output representation of a linearized smart factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorRepresentation {
    /// Explicit block Hessian (G, g, f), for dense or sparse direct solves.
    #[default]
    Hessian,
    /// Matrix-free Schur complement, for iterative solvers.
    ImplicitSchur,
    /// Null-space projected Jacobian; ignores damping.
    NullSpace,
}

/// Configuration for smart factor linearization.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartFactorConfig {
    /// Damping λ added to EᵀE before inversion (λ ≥ 0)
    pub lambda: f64,
    /// Damping term shape
    pub damping: DampingMode,
    /// Elimination algorithm for the Hessian representation
    pub schur_method: SchurMethod,
    /// Output representation
    pub representation: FactorRepresentation,
    /// Relative eigenvalue floor for the rank test on EᵀE
    pub rank_tolerance: f64,
    /// Maximum condition number of the damped point normal matrix
    pub condition_threshold: f64,
}

impl Default for SmartFactorConfig {
    fn default() -> Self {
        Self {
            lambda: 0.0,
            damping: DampingMode::Uniform,
            schur_method: SchurMethod::BlockSparse,
            representation: FactorRepresentation::Hessian,
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
        }
    }
}

impl SmartFactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_damping(mut self, damping: DampingMode) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_schur_method(mut self, schur_method: SchurMethod) -> Self {
        self.schur_method = schur_method;
        self
    }

    pub fn with_representation(mut self, representation: FactorRepresentation) -> Self {
        self.representation = representation;
        self
    }

    pub fn with_rank_tolerance(mut self, rank_tolerance: f64) -> Self {
        self.rank_tolerance = rank_tolerance;
        self
    }

    pub fn with_condition_threshold(mut self, condition_threshold: f64) -> Self {
        self.condition_threshold = condition_threshold;
        self
    }

    pub fn conditioning(&self) -> ConditioningPolicy {
        ConditioningPolicy {
            rank_tolerance: self.rank_tolerance,
            condition_threshold: self.condition_threshold,
        }
    }

    pub fn validate(&self) -> SmartFactorResult<()> {
        validate_lambda(self.lambda)?;
        self.conditioning().validate()
    }
}

/// Observations of one landmark from several views.
///
/// `D` is the per-view state dimension: 6 for pose-only views, or
/// `6 + Camera::CALIBRATION_DIM` when calibration is optimized with the pose.
#[derive(Debug, Clone, Default)]
pub struct SmartFactor<const D: usize> {
    measurements: MeasurementSet,
    body_p_sensor: Option<SE3>,
}

impl<const D: usize> SmartFactor<D> {
    pub fn new() -> Self {
        Self {
            measurements: MeasurementSet::new(),
            body_p_sensor: None,
        }
    }

    /// Factor whose cameras are mounted on a body at `body_p_sensor`.
    pub fn with_body_p_sensor(body_p_sensor: SE3) -> Self {
        Self {
            measurements: MeasurementSet::new(),
            body_p_sensor: Some(body_p_sensor),
        }
    }

    pub fn add(
        &mut self,
        measured: Vector2<f64>,
        key: Key,
        noise: SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        self.measurements.add(measured, key, noise)
    }

    pub fn add_batch(
        &mut self,
        measured: &[Vector2<f64>],
        keys: &[Key],
        noise: &[SharedNoiseModel],
    ) -> SmartFactorResult<()> {
        self.measurements.add_batch(measured, keys, noise)
    }

    pub fn add_batch_shared_noise(
        &mut self,
        measured: &[Vector2<f64>],
        keys: &[Key],
        noise: &SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        self.measurements.add_batch_shared_noise(measured, keys, noise)
    }

    pub fn add_track(
        &mut self,
        track: &SfmTrack,
        noise: &SharedNoiseModel,
    ) -> SmartFactorResult<()> {
        self.measurements.add_track(track, noise)
    }

    pub fn measurements(&self) -> &MeasurementSet {
        &self.measurements
    }

    pub fn num_views(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.measurements.keys()
    }

    pub fn measured(&self) -> Vec<Vector2<f64>> {
        self.measurements.measured()
    }

    pub fn noise_models(&self) -> Vec<SharedNoiseModel> {
        self.measurements.noise_models()
    }

    pub fn body_p_sensor(&self) -> Option<&SE3> {
        self.body_p_sensor.as_ref()
    }

    /// Compare keys, measurements, noise models and extrinsic within `tol`.
    pub fn equals(&self, other: &Self, tol: f64) -> bool {
        if self.num_views() != other.num_views() {
            return false;
        }
        let extrinsics_match = match (&self.body_p_sensor, &other.body_p_sensor) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is_approx(b, tol),
            _ => false,
        };
        extrinsics_match
            && self
                .measurements
                .iter()
                .zip(other.measurements.iter())
                .all(|(a, b)| {
                    a.key == b.key
                        && (a.measured - b.measured).amax() <= tol
                        && a.noise.equals(b.noise.as_ref(), tol)
                })
    }

    /// Eliminate the point at the given linearization point.
    pub fn linearize<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
        config: &SmartFactorConfig,
    ) -> SmartFactorResult<LinearizedSmartFactor<D>> {
        config.validate()?;
        self.check_cameras(cameras)?;
        debug!(
            "Linearizing smart factor over {} views as {:?}",
            self.num_views(),
            config.representation
        );

        let policy = config.conditioning();
        match config.representation {
            FactorRepresentation::Hessian => {
                let (blocks, covariance) = self.compute_jacobians_with_covariance(
                    cameras,
                    point,
                    config.lambda,
                    config.damping,
                    &policy,
                )?;
                let schur = eliminate_point(
                    config.schur_method,
                    &blocks.f_blocks,
                    &blocks.e,
                    &covariance,
                    &blocks.b,
                )?;
                Ok(LinearizedSmartFactor::Hessian(RegularHessianFactor::new(
                    self.keys(),
                    schur,
                    blocks.cost,
                )?))
            }
            FactorRepresentation::ImplicitSchur => {
                let (blocks, covariance) = self.compute_jacobians_with_covariance(
                    cameras,
                    point,
                    config.lambda,
                    config.damping,
                    &policy,
                )?;
                Ok(LinearizedSmartFactor::ImplicitSchur(ImplicitSchurFactor::new(
                    self.keys(),
                    blocks.f_blocks,
                    blocks.e,
                    covariance,
                    blocks.b,
                )?))
            }
            FactorRepresentation::NullSpace => {
                if config.lambda > 0.0 {
                    debug!("Null-space representation ignores lambda={:.2e}", config.lambda);
                }
                let blocks = self.compute_jacobians_svd(cameras, point, &policy)?;
                Ok(LinearizedSmartFactor::NullSpace(NullSpaceJacobianFactor::new(
                    self.keys(),
                    blocks.f_blocks,
                    blocks.e_null,
                    blocks.b,
                )?))
            }
        }
    }
}

impl<const D: usize> fmt::Display for SmartFactor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SmartFactor<{}> with {} measurements", D, self.num_views())?;
        for (i, m) in self.measurements.iter().enumerate() {
            writeln!(
                f,
                "  [{}] key {}: measured ({:.4}, {:.4}), noise {:?}",
                i, m.key, m.measured.x, m.measured.y, m.noise
            )?;
        }
        if let Some(body_p_sensor) = &self.body_p_sensor {
            writeln!(f, "  body_P_sensor: {}", body_p_sensor)?;
        }
        Ok(())
    }
}

/// One linearized smart factor in the representation the caller selected.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearizedSmartFactor<const D: usize> {
    Hessian(RegularHessianFactor<D>),
    ImplicitSchur(ImplicitSchurFactor<D>),
    NullSpace(NullSpaceJacobianFactor<D>),
}

impl<const D: usize> LinearizedSmartFactor<D> {
    pub fn representation(&self) -> FactorRepresentation {
        match self {
            LinearizedSmartFactor::Hessian(_) => FactorRepresentation::Hessian,
            LinearizedSmartFactor::ImplicitSchur(_) => FactorRepresentation::ImplicitSchur,
            LinearizedSmartFactor::NullSpace(_) => FactorRepresentation::NullSpace,
        }
    }

    pub fn keys(&self) -> &[Key] {
        match self {
            LinearizedSmartFactor::Hessian(factor) => factor.keys(),
            LinearizedSmartFactor::ImplicitSchur(factor) => factor.keys(),
            LinearizedSmartFactor::NullSpace(factor) => factor.keys(),
        }
    }

    pub fn dim(&self) -> usize {
        D * self.keys().len()
    }

    /// xᵀGx - 2gᵀx; identical across representations for the same input.
    pub fn quadratic_form(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        match self {
            LinearizedSmartFactor::Hessian(factor) => factor.quadratic_form(x),
            LinearizedSmartFactor::ImplicitSchur(factor) => factor.quadratic_form(x),
            LinearizedSmartFactor::NullSpace(factor) => factor.quadratic_form(x),
        }
    }

    /// Representation-specific error, differing only by a constant.
    pub fn error(&self, x: &DVector<f64>) -> SmartFactorResult<f64> {
        match self {
            LinearizedSmartFactor::Hessian(factor) => factor.error(x),
            LinearizedSmartFactor::ImplicitSchur(factor) => factor.error(x),
            LinearizedSmartFactor::NullSpace(factor) => factor.error(x),
        }
    }

    pub fn gradient_at_zero(&self) -> DVector<f64> {
        match self {
            LinearizedSmartFactor::Hessian(factor) => factor.gradient_at_zero(),
            LinearizedSmartFactor::ImplicitSchur(factor) => factor.gradient_at_zero(),
            LinearizedSmartFactor::NullSpace(factor) => factor.gradient_at_zero(),
        }
    }

    pub fn as_hessian(&self) -> Option<&RegularHessianFactor<D>> {
        match self {
            LinearizedSmartFactor::Hessian(factor) => Some(factor),
            _ => None,
        }
    }

    pub fn as_implicit_schur(&self) -> Option<&ImplicitSchurFactor<D>> {
        match self {
            LinearizedSmartFactor::ImplicitSchur(factor) => Some(factor),
            _ => None,
        }
    }

    pub fn as_null_space(&self) -> Option<&NullSpaceJacobianFactor<D>> {
        match self {
            LinearizedSmartFactor::NullSpace(factor) => Some(factor),
            _ => None,
        }
    }
}

/// Build a cross-representation error for callers that require one variant.
pub(crate) fn unexpected_representation(
    expected: FactorRepresentation,
    found: FactorRepresentation,
) -> SmartFactorError {
    SmartFactorError::InvalidArgument(format!(
        "expected {expected:?} representation, found {found:?}"
    ))
}

impl<const D: usize> TryFrom<LinearizedSmartFactor<D>> for RegularHessianFactor<D> {
    type Error = SmartFactorError;

    /// Implicit factors are expanded; null-space factors are rejected.
    fn try_from(value: LinearizedSmartFactor<D>) -> Result<Self, Self::Error> {
        match value {
            LinearizedSmartFactor::Hessian(factor) => Ok(factor),
            LinearizedSmartFactor::ImplicitSchur(factor) => factor.to_hessian_factor(),
            other => Err(unexpected_representation(
                FactorRepresentation::Hessian,
                other.representation(),
            )),
        }
    }
}
