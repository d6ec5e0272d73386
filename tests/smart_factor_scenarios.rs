//! End-to-end scenarios: well-posed two-view geometry, single-view
//! degeneracy, damping choices and input validation.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use apex_smart_factors::factors::measurement::SfmTrack;
use apex_smart_factors::factors::smart_factor::{
    FactorRepresentation, SmartFactor, SmartFactorConfig,
};
use apex_smart_factors::linalg::point_covariance::{ConditioningPolicy, DampingMode};
use apex_smart_factors::{Camera, CameraModelError, SmartFactorError};
use nalgebra::{Matrix3, Vector2, Vector3};

use scene_test_utils::*;

fn assert_symmetric_positive_definite(p: &Matrix3<f64>) {
    assert!(p.iter().all(|v| v.is_finite()));
    assert!((p - p.transpose()).amax() <= 1e-12 * p.amax());
    assert!(p.cholesky().is_some(), "covariance is not positive definite");
    let eigenvalues = p.symmetric_eigenvalues();
    assert!(eigenvalues.iter().all(|&ev| ev > 0.0));
}

#[test]
fn test_two_views_perfect_measurements() {
    let point = landmark();
    let cameras = cameras(2);
    let factor = build_factor::<6>(&cameras, &[0, 1], &point, false, &unit_noise());

    let residual = factor.reprojection_error(&cameras, &point).unwrap();
    assert_eq!(residual.len(), 4);
    assert!(residual.iter().all(|&r| r == 0.0));
    assert_eq!(factor.total_reprojection_error(&cameras, &point).unwrap(), 0.0);

    let (e, covariance) = factor
        .compute_point_covariance(
            &cameras,
            &point,
            0.0,
            DampingMode::Uniform,
            &ConditioningPolicy::default(),
        )
        .unwrap();
    assert_eq!(e.nrows(), 4);
    assert_symmetric_positive_definite(&covariance);

    // P is the inverse of EᵀE.
    let product = covariance * (e.transpose() * &e);
    assert!((product - Matrix3::identity()).amax() < 1e-8);

    let linearized = factor
        .linearize(&cameras, &point, &SmartFactorConfig::new())
        .unwrap();
    assert_eq!(linearized.keys(), &[0, 1]);
    assert_eq!(linearized.dim(), 12);
    assert!(linearized.gradient_at_zero().amax() < 1e-9);
    assert_eq!(linearized.as_hessian().unwrap().constant_term(), 0.0);
}

#[test]
fn test_single_view_is_degenerate() {
    let point = landmark();
    let cameras = cameras(1);
    let factor = build_factor::<6>(&cameras, &[7], &point, true, &unit_noise());

    for lambda in [0.0, 1.0] {
        let result = factor.compute_point_covariance(
            &cameras,
            &point,
            lambda,
            DampingMode::Uniform,
            &ConditioningPolicy::default(),
        );
        assert!(
            matches!(result, Err(SmartFactorError::DegenerateConfiguration(_))),
            "lambda={lambda}: {result:?}"
        );
    }

    for representation in [
        FactorRepresentation::Hessian,
        FactorRepresentation::ImplicitSchur,
        FactorRepresentation::NullSpace,
    ] {
        let config = SmartFactorConfig::new().with_representation(representation);
        let err = factor.linearize(&cameras, &point, &config).unwrap_err();
        assert!(matches!(err, SmartFactorError::DegenerateConfiguration(_)));
        assert!(err.is_recoverable());
    }

    // Residuals are still well defined.
    assert_eq!(factor.reprojection_error(&cameras, &point).unwrap().len(), 2);
}

#[test]
fn test_damping_modes_give_different_covariances() {
    let point = landmark();
    let cameras = cameras(3);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2], &point, true, &unit_noise());
    let policy = ConditioningPolicy::default();

    let (_, uniform) = factor
        .compute_point_covariance(&cameras, &point, 0.1, DampingMode::Uniform, &policy)
        .unwrap();
    let (_, diagonal) = factor
        .compute_point_covariance(&cameras, &point, 0.1, DampingMode::Diagonal, &policy)
        .unwrap();
    let (_, undamped) = factor
        .compute_point_covariance(&cameras, &point, 0.0, DampingMode::Diagonal, &policy)
        .unwrap();

    assert_symmetric_positive_definite(&uniform);
    assert_symmetric_positive_definite(&diagonal);
    assert!((uniform - diagonal).amax() > 1e-9 * uniform.amax());

    // Damping only ever shrinks the covariance.
    assert!(undamped.trace() > uniform.trace());
    assert!(undamped.trace() > diagonal.trace());
}

#[test]
fn test_ill_conditioned_point_is_rejected() {
    // Nearly coincident centers observing a far point.
    let point = Vector3::new(0.0, 0.0, 1e6);
    let cameras = vec![
        TestCamera::new(
            apex_smart_factors::SE3::from_translation_euler(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            calibration(),
        ),
        TestCamera::new(
            apex_smart_factors::SE3::from_translation_euler(1e-6, 0.0, 0.0, 0.0, 0.0, 0.0),
            calibration(),
        ),
    ];
    let factor = build_factor::<6>(&cameras, &[0, 1], &point, false, &unit_noise());

    let result = factor.compute_point_covariance(
        &cameras,
        &point,
        0.0,
        DampingMode::Uniform,
        &ConditioningPolicy::default(),
    );
    assert!(matches!(result, Err(SmartFactorError::DegenerateConfiguration(_))));
}

#[test]
fn test_point_behind_camera_reports_view() {
    let cameras = cameras(3);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2], &landmark(), false, &unit_noise());

    // Behind every camera; the first failing view is reported.
    let behind = Vector3::new(0.0, 0.0, -4.0);
    match factor.compute_jacobians(&cameras, &behind) {
        Err(SmartFactorError::ProjectionFailure { view, source }) => {
            assert_eq!(view, 0);
            assert!(matches!(source, CameraModelError::PointBehindCamera { .. }));
        }
        other => panic!("expected projection failure, got {other:?}"),
    }

    let err = factor
        .total_reprojection_error(&cameras, &behind)
        .unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn test_camera_count_mismatch() {
    let cameras = cameras(3);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2], &landmark(), false, &unit_noise());

    let err = factor
        .linearize(&cameras[..2], &landmark(), &SmartFactorConfig::new())
        .unwrap_err();
    assert!(matches!(err, SmartFactorError::InvalidArgument(_)));
    assert!(!err.is_recoverable());

    let empty = SmartFactor::<6>::new();
    assert!(matches!(
        empty.reprojection_error::<TestCamera>(&[], &landmark()),
        Err(SmartFactorError::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let cameras = cameras(2);
    let factor = build_factor::<6>(&cameras, &[0, 1], &landmark(), false, &unit_noise());

    for config in [
        SmartFactorConfig::new().with_lambda(-1.0),
        SmartFactorConfig::new().with_lambda(f64::NAN),
        SmartFactorConfig::new().with_rank_tolerance(0.0),
        SmartFactorConfig::new().with_condition_threshold(0.5),
    ] {
        assert!(matches!(
            factor.linearize(&cameras, &landmark(), &config),
            Err(SmartFactorError::InvalidArgument(_))
        ));
    }
}

#[test]
fn test_factor_from_track() {
    let cameras = cameras(3);
    let mut track = SfmTrack::new(landmark());
    for (key, camera) in cameras.iter().enumerate() {
        track.add_observation(key + 10, camera.project(&track.point).unwrap());
    }

    let mut factor = SmartFactor::<6>::new();
    factor.add_track(&track, &unit_noise()).unwrap();
    assert_eq!(factor.keys(), vec![10, 11, 12]);
    assert_eq!(factor.total_reprojection_error(&cameras, &track.point).unwrap(), 0.0);

    // The track's point estimate is the linearization point.
    let linearized = factor.linearize(&cameras, &track.point, &SmartFactorConfig::new()).unwrap();
    assert_eq!(linearized.keys(), &[10, 11, 12]);
    assert!(linearized.gradient_at_zero().amax() < 1e-9);

    let reference = build_factor::<6>(&cameras, &[10, 11, 12], &track.point, false, &unit_noise());
    assert!(factor.equals(&reference, 1e-12));

    // A second observation of the same key is rejected.
    let err = factor.add(Vector2::new(1.0, 2.0), 11, unit_noise()).unwrap_err();
    assert!(matches!(err, SmartFactorError::InvalidArgument(_)));
    assert_eq!(factor.num_views(), 3);

    // A track that overlaps the factor is rejected as a whole.
    let mut overlapping = SfmTrack::new(track.point);
    overlapping.add_observation(13, Vector2::new(1.0, 2.0));
    overlapping.add_observation(12, Vector2::new(3.0, 4.0));
    assert!(factor.add_track(&overlapping, &unit_noise()).is_err());
    assert_eq!(factor.keys(), vec![10, 11, 12]);
}
