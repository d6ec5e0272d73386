//! Reprojection residuals and whitened Jacobians of a smart factor.
//!
//! For view i with camera `C_i`, measurement `z_i` and prediction `h_i(x, p)`:
//!
//! ```text
//! r_i = h_i - z_i                       (reprojection_error)
//! b_i = -(h_i - z_i)                    (linearized right-hand side)
//! [F_i | E_i], b_i  ← whitened jointly by the view's noise model
//! f = Σ ‖b_i‖²
//! ```
//!
//! F_i is 2×D: the 2×6 pose derivative, followed by the calibration
//! derivative when D = 6 + CALIBRATION_DIM. When the factor carries a
//! body-to-sensor extrinsic, the supplied cameras hold body poses; the point
//! is projected through `body ∘ body_P_sensor` and pose derivatives are mapped
//! back to the body tangent space with `Ad(body_P_sensor⁻¹)`.

use crate::error::{SmartFactorError, SmartFactorResult};
use crate::factors::camera::Camera;
use crate::factors::measurement::Measurement;
use crate::factors::smart_factor::SmartFactor;
use crate::linalg::null_space::null_space_basis;
use crate::linalg::point_covariance::{
    ConditioningPolicy, DampingMode, point_covariance, validate_lambda,
};
use crate::linalg::schur::stack_view_blocks;
use crate::manifold::LieGroup;
use nalgebra::{
    DMatrix, DVector, Matrix2x3, Matrix2xX, Matrix3, MatrixXx3, SMatrix, Vector2, Vector3,
};
use tracing::{debug, trace};

/// Pose tangent dimension.
pub const POSE_DIM: usize = 6;

/// Whitened per-view blocks at one linearization point.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianBlocks<const D: usize> {
    /// F_i, one 2×D block per view in key order.
    pub f_blocks: Vec<SMatrix<f64, 2, D>>,
    /// Stacked point Jacobian, 2m×3.
    pub e: MatrixXx3<f64>,
    /// Stacked right-hand side -(h - z), 2m.
    pub b: DVector<f64>,
    /// f = ‖b‖².
    pub cost: f64,
}

/// F blocks with the null-space basis of E instead of E itself.
#[derive(Debug, Clone, PartialEq)]
pub struct NullSpaceBlocks<const D: usize> {
    pub f_blocks: Vec<SMatrix<f64, 2, D>>,
    /// 2m×(2m−3), orthonormal, orthogonal to E.
    pub e_null: DMatrix<f64>,
    pub b: DVector<f64>,
    pub cost: f64,
}

/// Same content as [`JacobianBlocks`] with F as a block-diagonal 2m×Dm matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseJacobians {
    pub f: DMatrix<f64>,
    pub e: MatrixXx3<f64>,
    pub b: DVector<f64>,
    pub cost: f64,
}

/// Same content as [`NullSpaceBlocks`] with a dense 2m×Dm F.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseNullSpaceJacobians {
    pub f: DMatrix<f64>,
    pub e_null: DMatrix<f64>,
    pub b: DVector<f64>,
    pub cost: f64,
}

struct ViewJacobians<const D: usize> {
    f: SMatrix<f64, 2, D>,
    e: Matrix2x3<f64>,
    b: Vector2<f64>,
}

impl<const D: usize> SmartFactor<D> {
    /// Reject inputs that cannot be evaluated, before any numerical work.
    pub(crate) fn check_cameras<C: Camera>(&self, cameras: &[C]) -> SmartFactorResult<()> {
        if self.is_empty() {
            return Err(SmartFactorError::InvalidArgument(
                "smart factor has no measurements".to_string(),
            ));
        }
        if cameras.len() != self.num_views() {
            return Err(SmartFactorError::InvalidArgument(format!(
                "{} cameras supplied for {} measurements",
                cameras.len(),
                self.num_views()
            )));
        }
        if D != POSE_DIM && D != POSE_DIM + C::CALIBRATION_DIM {
            return Err(SmartFactorError::InvalidArgument(format!(
                "view dimension {} must be {} (pose) or {} (pose + calibration)",
                D,
                POSE_DIM,
                POSE_DIM + C::CALIBRATION_DIM
            )));
        }
        Ok(())
    }

    /// The camera that actually observes the point.
    fn sensor_camera<C: Camera>(&self, camera: &C) -> C {
        match self.body_p_sensor() {
            Some(body_p_sensor) => camera.with_pose(camera.pose().compose(body_p_sensor)),
            None => camera.clone(),
        }
    }

    fn predict<C: Camera>(
        &self,
        view: usize,
        camera: &C,
        point: &Vector3<f64>,
    ) -> SmartFactorResult<Vector2<f64>> {
        self.sensor_camera(camera).project(point).map_err(|source| {
            debug!("Projection failed in view {}: {}", view, source);
            SmartFactorError::ProjectionFailure { view, source }
        })
    }

    fn view_jacobians<C: Camera>(
        &self,
        view: usize,
        camera: &C,
        measurement: &Measurement,
        point: &Vector3<f64>,
    ) -> SmartFactorResult<ViewJacobians<D>> {
        let projection = self
            .sensor_camera(camera)
            .project_with_jacobians(point)
            .map_err(|source| {
                debug!("Projection failed in view {}: {}", view, source);
                SmartFactorError::ProjectionFailure { view, source }
            })?;

        let d_pose = match self.body_p_sensor() {
            Some(body_p_sensor) => projection.d_pose * body_p_sensor.inverse().adjoint(),
            None => projection.d_pose,
        };

        // [F | E] side by side so whitening treats them as one system.
        let mut jacobian = Matrix2xX::zeros(D + 3);
        for r in 0..2 {
            for c in 0..POSE_DIM {
                jacobian[(r, c)] = d_pose[(r, c)];
            }
            for c in POSE_DIM..D {
                jacobian[(r, c)] = projection.d_calibration[(r, c - POSE_DIM)];
            }
            for c in 0..3 {
                jacobian[(r, D + c)] = projection.d_point[(r, c)];
            }
        }
        let mut b = measurement.measured - projection.uv;
        measurement.noise.whiten_system(&mut jacobian, &mut b);

        trace!("View {} (key {}): whitened residual {:?}", view, measurement.key, b);
        Ok(ViewJacobians {
            f: SMatrix::<f64, 2, D>::from_fn(|r, c| jacobian[(r, c)]),
            e: Matrix2x3::from_fn(|r, c| jacobian[(r, D + c)]),
            b,
        })
    }

    /// Stacked unwhitened residuals `h_i - z_i`, 2m.
    pub fn reprojection_error<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
    ) -> SmartFactorResult<DVector<f64>> {
        self.check_cameras(cameras)?;
        let mut residual = DVector::zeros(2 * self.num_views());
        for (i, (camera, measurement)) in cameras
            .iter()
            .zip(self.measurements().iter())
            .enumerate()
        {
            let r = self.predict(i, camera, point)? - measurement.measured;
            residual.fixed_rows_mut::<2>(2 * i).copy_from(&r);
        }
        Ok(residual)
    }

    /// Σ 0.5 · distance_i(h_i - z_i).
    pub fn total_reprojection_error<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
    ) -> SmartFactorResult<f64> {
        self.check_cameras(cameras)?;
        let mut total = 0.0;
        for (i, (camera, measurement)) in cameras
            .iter()
            .zip(self.measurements().iter())
            .enumerate()
        {
            let r = self.predict(i, camera, point)? - measurement.measured;
            total += 0.5 * measurement.noise.distance(&r);
        }
        Ok(total)
    }

    /// Whitened F blocks, E, b and f = ‖b‖².
    pub fn compute_jacobians<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
    ) -> SmartFactorResult<JacobianBlocks<D>> {
        self.check_cameras(cameras)?;
        let m = self.num_views();
        let mut f_blocks = Vec::with_capacity(m);
        let mut e = MatrixXx3::zeros(2 * m);
        let mut b = DVector::zeros(2 * m);

        for (i, (camera, measurement)) in cameras
            .iter()
            .zip(self.measurements().iter())
            .enumerate()
        {
            let view = self.view_jacobians(i, camera, measurement, point)?;
            e.fixed_rows_mut::<2>(2 * i).copy_from(&view.e);
            b.fixed_rows_mut::<2>(2 * i).copy_from(&view.b);
            f_blocks.push(view.f);
        }

        let cost = b.norm_squared();
        Ok(JacobianBlocks {
            f_blocks,
            e,
            b,
            cost,
        })
    }

    /// Whitened blocks plus `P = (EᵀE + λ·Damp)⁻¹`.
    pub fn compute_jacobians_with_covariance<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
        lambda: f64,
        damping: DampingMode,
        policy: &ConditioningPolicy,
    ) -> SmartFactorResult<(JacobianBlocks<D>, Matrix3<f64>)> {
        validate_lambda(lambda)?;
        policy.validate()?;
        let blocks = self.compute_jacobians(cameras, point)?;
        let covariance = point_covariance(&blocks.e, lambda, damping, policy)?;
        Ok((blocks, covariance))
    }

    /// Whitened E and the point covariance only.
    pub fn compute_point_covariance<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
        lambda: f64,
        damping: DampingMode,
        policy: &ConditioningPolicy,
    ) -> SmartFactorResult<(MatrixXx3<f64>, Matrix3<f64>)> {
        let (blocks, covariance) =
            self.compute_jacobians_with_covariance(cameras, point, lambda, damping, policy)?;
        Ok((blocks.e, covariance))
    }

    /// Whitened F blocks and b with the null-space basis of E.
    pub fn compute_jacobians_svd<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
        policy: &ConditioningPolicy,
    ) -> SmartFactorResult<NullSpaceBlocks<D>> {
        policy.validate()?;
        let blocks = self.compute_jacobians(cameras, point)?;
        let e_null = null_space_basis(&blocks.e, policy)?;
        Ok(NullSpaceBlocks {
            f_blocks: blocks.f_blocks,
            e_null,
            b: blocks.b,
            cost: blocks.cost,
        })
    }

    /// [`SmartFactor::compute_jacobians`] with F stacked block-diagonally.
    pub fn compute_jacobians_dense<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
    ) -> SmartFactorResult<DenseJacobians> {
        let blocks = self.compute_jacobians(cameras, point)?;
        Ok(DenseJacobians {
            f: stack_view_blocks(&blocks.f_blocks),
            e: blocks.e,
            b: blocks.b,
            cost: blocks.cost,
        })
    }

    /// [`SmartFactor::compute_jacobians_svd`] with F stacked block-diagonally.
    pub fn compute_jacobians_svd_dense<C: Camera>(
        &self,
        cameras: &[C],
        point: &Vector3<f64>,
        policy: &ConditioningPolicy,
    ) -> SmartFactorResult<DenseNullSpaceJacobians> {
        let blocks = self.compute_jacobians_svd(cameras, point, policy)?;
        Ok(DenseNullSpaceJacobians {
            f: stack_view_blocks(&blocks.f_blocks),
            e_null: blocks.e_null,
            b: blocks.b,
            cost: blocks.cost,
        })
    }
}
