//! Cross-checks between the elimination algorithms and output representations
//!
//! Every path (dense Schur, block-sparse Schur, matrix-free Schur, null-space
//! projection) must describe the same quadratic cost over the view variables.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use apex_smart_factors::core::loss_functions::HuberLoss;
use apex_smart_factors::factors::hessian_factor::RegularHessianFactor;
use apex_smart_factors::factors::noise_model::{
    GaussianNoise, NoiseModel, RobustNoise, SharedNoiseModel,
};
use apex_smart_factors::factors::smart_factor::{
    FactorRepresentation, SmartFactor, SmartFactorConfig,
};
use apex_smart_factors::linalg::point_covariance::{ConditioningPolicy, DampingMode};
use apex_smart_factors::linalg::schur::{
    SchurMethod, schur_complement_block_sparse, schur_complement_dense,
};
use apex_smart_factors::{Camera, LieGroup, SmartFactorError};
use nalgebra::{DMatrix, Matrix2, Vector3};

use scene_test_utils::*;

fn hessian_of<const D: usize>(
    factor: &SmartFactor<D>,
    cameras: &[TestCamera],
    config: &SmartFactorConfig,
) -> RegularHessianFactor<D> {
    let linearized = factor.linearize(cameras, &landmark(), config).unwrap();
    linearized.as_hessian().expect("Hessian representation").clone()
}

#[test]
fn test_dense_and_block_sparse_schur_agree() {
    let point = landmark();
    for m in 2..=6 {
        let cameras = cameras(m);
        let keys: Vec<usize> = (0..m).collect();
        let factor = build_factor::<6>(&cameras, &keys, &point, true, &unit_noise());

        let (blocks, covariance) = factor
            .compute_jacobians_with_covariance(
                &cameras,
                &point,
                0.0,
                DampingMode::Uniform,
                &ConditioningPolicy::default(),
            )
            .unwrap();

        let dense =
            schur_complement_dense(&blocks.f_blocks, &blocks.e, &covariance, &blocks.b).unwrap();
        let sparse =
            schur_complement_block_sparse(&blocks.f_blocks, &blocks.e, &covariance, &blocks.b)
                .unwrap();

        assert_eq!(dense.hessian_blocks.len(), m * (m + 1) / 2);
        assert_eq!(sparse.hessian_blocks.len(), m * (m + 1) / 2);

        let scale = dense.hessian_blocks.iter().map(|g| g.amax()).fold(1.0, f64::max);
        for (d, s) in dense.hessian_blocks.iter().zip(&sparse.hessian_blocks) {
            assert!((d - s).amax() <= 1e-9 * scale, "m={m}: Hessian blocks differ");
        }
        let scale = dense.linear_terms.iter().map(|g| g.amax()).fold(1.0, f64::max);
        for (d, s) in dense.linear_terms.iter().zip(&sparse.linear_terms) {
            assert!((d - s).amax() <= 1e-9 * scale, "m={m}: linear terms differ");
        }
    }
}

#[test]
fn test_linearize_dense_and_auto_match_block_sparse() {
    let cameras = cameras(5);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3, 4], &landmark(), true, &unit_noise());

    let sparse = hessian_of(&factor, &cameras, &SmartFactorConfig::new());
    for method in [SchurMethod::Dense, SchurMethod::Auto] {
        let config = SmartFactorConfig::new().with_schur_method(method);
        let other = hessian_of(&factor, &cameras, &config);
        let scale = sparse.information().amax();
        assert!((sparse.information() - other.information()).amax() <= 1e-9 * scale);
        assert_eq!(sparse.constant_term(), other.constant_term());
    }
}

#[test]
fn test_hessian_and_implicit_quadratic_forms_agree() {
    let cameras = cameras(4);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3], &landmark(), true, &unit_noise());
    let x = perturbation(24);

    for (lambda, damping) in [
        (0.0, DampingMode::Uniform),
        (0.5, DampingMode::Uniform),
        (1e-3, DampingMode::Diagonal),
    ] {
        let base = SmartFactorConfig::new().with_lambda(lambda).with_damping(damping);
        let hessian = factor
            .linearize(
                &cameras,
                &landmark(),
                &base.clone().with_representation(FactorRepresentation::Hessian),
            )
            .unwrap();
        let implicit = factor
            .linearize(
                &cameras,
                &landmark(),
                &base.with_representation(FactorRepresentation::ImplicitSchur),
            )
            .unwrap();

        assert_relative_eq(
            hessian.quadratic_form(&x).unwrap(),
            implicit.quadratic_form(&x).unwrap(),
            1e-9,
            "Hessian vs implicit quadratic form",
        );

        let gradient_gap = (hessian.gradient_at_zero() - implicit.gradient_at_zero()).amax();
        assert!(gradient_gap <= 1e-9 * hessian.gradient_at_zero().amax().max(1.0));
    }
}

#[test]
fn test_hessian_and_null_space_quadratic_forms_agree() {
    let cameras = cameras(5);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3, 4], &landmark(), true, &unit_noise());
    let x = perturbation(30);

    let hessian = factor.linearize(&cameras, &landmark(), &SmartFactorConfig::new()).unwrap();
    let null_space = factor
        .linearize(
            &cameras,
            &landmark(),
            &SmartFactorConfig::new().with_representation(FactorRepresentation::NullSpace),
        )
        .unwrap();

    assert_relative_eq(
        hessian.quadratic_form(&x).unwrap(),
        null_space.quadratic_form(&x).unwrap(),
        1e-7,
        "Hessian vs null-space quadratic form",
    );

    let dense_hessian = hessian.as_hessian().unwrap().information();
    let projected = null_space.as_null_space().unwrap().information();
    assert!((&dense_hessian - projected).amax() <= 1e-7 * dense_hessian.amax());

    // Same residual, so both errors agree at zero up to the removed point term.
    let zero = nalgebra::DVector::zeros(30);
    assert!(null_space.error(&zero).unwrap() <= hessian.error(&zero).unwrap() + 1e-9);
}

#[test]
fn test_null_space_basis_properties() {
    let cameras = cameras(4);
    let point = landmark();
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3], &point, true, &unit_noise());

    let blocks = factor
        .compute_jacobians_svd(&cameras, &point, &ConditioningPolicy::default())
        .unwrap();
    let jacobians = factor.compute_jacobians(&cameras, &point).unwrap();

    assert_eq!((blocks.e_null.nrows(), blocks.e_null.ncols()), (8, 5));
    let gram = blocks.e_null.transpose() * &blocks.e_null;
    assert!((gram - DMatrix::identity(5, 5)).amax() < 1e-10);
    assert!((blocks.e_null.transpose() * &jacobians.e).amax() < 1e-8 * jacobians.e.amax());

    let dense = factor
        .compute_jacobians_svd_dense(&cameras, &point, &ConditioningPolicy::default())
        .unwrap();
    assert_eq!((dense.f.nrows(), dense.f.ncols()), (8, 24));
    assert_eq!(
        dense.f.view((2, 6), (2, 6)).clone_owned(),
        DMatrix::from_column_slice(2, 6, jacobians.f_blocks[1].as_slice())
    );
    assert_eq!(dense.f[(0, 6)], 0.0);
    assert_eq!(dense.cost, jacobians.cost);
}

#[test]
fn test_permutation_invariance() {
    let point = landmark();
    let all_cameras = cameras(4);
    let factor = build_factor::<6>(&all_cameras, &[0, 1, 2, 3], &point, true, &unit_noise());

    // Same (measurement, key, noise) triples added in a different order.
    let order = [2usize, 0, 3, 1];
    let permuted_cameras: Vec<TestCamera> = order.iter().map(|&i| all_cameras[i].clone()).collect();
    let permuted = build_factor::<6>(&permuted_cameras, &order, &point, true, &unit_noise());

    let a = hessian_of(&factor, &all_cameras, &SmartFactorConfig::new());
    let b = hessian_of(&permuted, &permuted_cameras, &SmartFactorConfig::new());
    assert_eq!(b.keys(), &order);

    let scale = a.information().amax();
    for i in 0..4 {
        for j in 0..4 {
            let gap = (b.hessian_block(i, j) - a.hessian_block(order[i], order[j])).amax();
            assert!(gap <= 1e-9 * scale, "block ({i}, {j}) not permuted consistently");
        }
        let gap = (b.linear_terms()[i] - a.linear_terms()[order[i]]).amax();
        assert!(gap <= 1e-9 * scale.max(1.0));
    }
    assert_relative_eq(a.constant_term(), b.constant_term(), 1e-12, "constant term");

    let x = perturbation(24);
    let mut x_permuted = x.clone();
    for (i, &source) in order.iter().enumerate() {
        x_permuted.rows_mut(6 * i, 6).copy_from(&x.rows(6 * source, 6));
    }
    assert_relative_eq(
        a.quadratic_form(&x).unwrap(),
        b.quadratic_form(&x_permuted).unwrap(),
        1e-9,
        "permuted quadratic form",
    );
}

#[test]
fn test_total_error_matches_hessian_constant() {
    let point = landmark();
    let cameras = cameras(3);
    let noise: SharedNoiseModel = GaussianNoise::from_covariance(&Matrix2::new(2.0, 0.3, 0.3, 1.0))
        .unwrap()
        .shared();
    let factor = build_factor::<6>(&cameras, &[0, 1, 2], &point, true, &noise);

    let residual = factor.reprojection_error(&cameras, &point).unwrap();
    let expected: f64 = (0..3)
        .map(|i| {
            let r = nalgebra::Vector2::new(residual[2 * i], residual[2 * i + 1]);
            0.5 * noise.distance(&r)
        })
        .sum();
    let total = factor.total_reprojection_error(&cameras, &point).unwrap();
    assert_relative_eq(total, expected, 1e-12, "total reprojection error");

    let hessian = hessian_of(&factor, &cameras, &SmartFactorConfig::new());
    assert_relative_eq(0.5 * hessian.constant_term(), total, 1e-10, "0.5 f");

    let perfect = build_factor::<6>(&cameras, &[0, 1, 2], &point, false, &unit_noise());
    assert_eq!(perfect.total_reprojection_error(&cameras, &point).unwrap(), 0.0);
}

#[test]
fn test_joint_calibration_blocks() {
    let point = landmark();
    let cameras = cameras(4);
    let factor = build_factor::<10>(&cameras, &[0, 1, 2, 3], &point, true, &unit_noise());

    let blocks = factor.compute_jacobians(&cameras, &point).unwrap();
    let pose_only = build_factor::<6>(&cameras, &[0, 1, 2, 3], &point, true, &unit_noise())
        .compute_jacobians(&cameras, &point)
        .unwrap();
    for (full, pose) in blocks.f_blocks.iter().zip(&pose_only.f_blocks) {
        assert_eq!(full.fixed_view::<2, 6>(0, 0), pose.fixed_view::<2, 6>(0, 0));
    }
    // ∂u/∂cx = 1, ∂v/∂cy = 1 under unit noise.
    assert_eq!(blocks.f_blocks[0][(0, 8)], 1.0);
    assert_eq!(blocks.f_blocks[0][(1, 9)], 1.0);

    let x = perturbation(40);
    let hessian = factor.linearize(&cameras, &point, &SmartFactorConfig::new()).unwrap();
    let implicit = factor
        .linearize(
            &cameras,
            &point,
            &SmartFactorConfig::new().with_representation(FactorRepresentation::ImplicitSchur),
        )
        .unwrap();
    assert_relative_eq(
        hessian.quadratic_form(&x).unwrap(),
        implicit.quadratic_form(&x).unwrap(),
        1e-9,
        "calibrated quadratic form",
    );

    let invalid = build_factor::<7>(&cameras, &[0, 1, 2, 3], &point, false, &unit_noise());
    assert!(matches!(
        invalid.compute_jacobians(&cameras, &point),
        Err(SmartFactorError::InvalidArgument(_))
    ));
}

#[test]
fn test_robust_noise_keeps_representations_consistent() {
    let point = landmark();
    let cameras = cameras(4);
    let noise = RobustNoise::new(unit_noise(), HuberLoss::new(1.0).unwrap()).shared();
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3], &point, true, &noise);

    let x = perturbation(24);
    let hessian = factor.linearize(&cameras, &point, &SmartFactorConfig::new()).unwrap();
    let implicit = factor
        .linearize(
            &cameras,
            &point,
            &SmartFactorConfig::new().with_representation(FactorRepresentation::ImplicitSchur),
        )
        .unwrap();
    assert_relative_eq(
        hessian.quadratic_form(&x).unwrap(),
        implicit.quadratic_form(&x).unwrap(),
        1e-9,
        "robust quadratic form",
    );

    // Pixel offsets exceed the Huber threshold, so reweighting shrinks f.
    let plain = build_factor::<6>(&cameras, &[0, 1, 2, 3], &point, true, &unit_noise());
    let plain_hessian = plain.linearize(&cameras, &point, &SmartFactorConfig::new()).unwrap();
    assert!(
        hessian.as_hessian().unwrap().constant_term()
            < plain_hessian.as_hessian().unwrap().constant_term()
    );
}

#[test]
fn test_concurrent_linearization_of_shared_factor() {
    let point = landmark();
    let cameras = cameras(5);
    let factor = build_factor::<6>(&cameras, &[0, 1, 2, 3, 4], &point, true, &unit_noise());
    let expected = hessian_of(&factor, &cameras, &SmartFactorConfig::new());

    let (factor, cameras) = (&factor, &cameras);
    let results: Vec<RegularHessianFactor<6>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || hessian_of(factor, cameras, &SmartFactorConfig::new())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in results {
        assert_eq!(result, expected);
    }
}

#[test]
fn test_extrinsic_jacobians_match_finite_differences() {
    let point = Vector3::new(0.3, 0.1, 6.0);
    let body_p_sensor =
        apex_smart_factors::SE3::from_translation_euler(0.1, -0.05, 0.2, 0.02, -0.03, 0.05);
    let bodies = cameras(3);

    let mut factor = SmartFactor::<6>::with_body_p_sensor(body_p_sensor.clone());
    for (key, body) in bodies.iter().enumerate() {
        let sensor = body.with_pose(body.pose().compose(&body_p_sensor));
        factor
            .add(sensor.project(&point).unwrap() + pixel_noise(key), key, unit_noise())
            .unwrap();
    }

    let blocks = factor.compute_jacobians(&bodies, &point).unwrap();
    let residual = factor.reprojection_error(&bodies, &point).unwrap();
    assert!((&blocks.b + &residual).amax() < 1e-12);

    let eps = 1e-6;
    for view in 0..3 {
        for k in 0..6 {
            let mut tau = nalgebra::Vector6::zeros();
            tau[k] = eps;
            let shifted = |sign: f64| {
                let mut moved = bodies.clone();
                let delta = apex_smart_factors::manifold::se3::SE3Tangent::from_vector(tau * sign);
                moved[view] = moved[view].with_pose(moved[view].pose().plus(&delta));
                factor.reprojection_error(&moved, &point).unwrap()
            };
            let numerical = (shifted(1.0) - shifted(-1.0)) / (2.0 * eps);
            for r in 0..2 {
                let analytical = blocks.f_blocks[view][(r, k)];
                let num = numerical[2 * view + r];
                assert!(
                    (analytical - num).abs() <= 1e-5 * (1.0 + num.abs()),
                    "view {view}, row {r}, column {k}: analytical={analytical}, numerical={num}"
                );
            }
        }
    }

    for k in 0..3 {
        let mut delta = Vector3::zeros();
        delta[k] = eps;
        let numerical = (factor.reprojection_error(&bodies, &(point + delta)).unwrap()
            - factor.reprojection_error(&bodies, &(point - delta)).unwrap())
            / (2.0 * eps);
        for row in 0..6 {
            let analytical = blocks.e[(row, k)];
            assert!((analytical - numerical[row]).abs() <= 1e-5 * (1.0 + numerical[row].abs()));
        }
    }
}
