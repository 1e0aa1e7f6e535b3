use nalgebra as na;
use rand::{thread_rng, Rng};

use na::{Vector3,Vector6,SVector,Isometry3};
use preintegration::odometry::imu_odometry::{ImuTangent, bias::ImuBias, nav_state::NavState};
use preintegration::odometry::imu_odometry::preintegration::PreintegratedMeasurement;
use preintegration::odometry::imu_odometry::preintegration_parameters::{PreintegrationParameters,CoriolisCompensation,PositionIntegration};
use preintegration::odometry::imu_odometry::factor::{compute_error,compute_error_with_jacobians,FactorKeys,ImuFactor};
use preintegration::numerics::{lie::exp_r, pose};
use preintegration::numerics::numerical_derivative::{numerical_derivative,numerical_derivative_retract,DEFAULT_DELTA};
use preintegration::Float;

const KEYS: FactorKeys = FactorKeys { pose_i: 0, vel_i: 1, pose_j: 2, vel_j: 3, bias: 4 };

fn parameters_with(coriolis: CoriolisCompensation) -> PreintegrationParameters {
    PreintegrationParameters {
        coriolis,
        ..PreintegrationParameters::from_noise_densities(&Vector3::<Float>::repeat(1e-2), &Vector3::<Float>::repeat(1e-3), 1e-4, &Vector3::<Float>::new(0.0,0.0,-9.81))
    }
}

fn moving_preintegration(parameters: &PreintegrationParameters, bias_hat: &ImuBias) -> PreintegratedMeasurement {
    let mut preintegrated = PreintegratedMeasurement::new(parameters, bias_hat).unwrap();
    for i in 0..50 {
        let t = (i as Float)*0.01;
        let acc = Vector3::<Float>::new(0.4*(2.0*t).cos(), -0.3 + 0.2*t, 9.9);
        let omega = Vector3::<Float>::new(0.3, -0.1 + 0.2*t, 0.5);
        preintegrated.integrate_measurement(&acc, &omega, 0.01).unwrap();
    }
    preintegrated
}

fn moving_states() -> (NavState, NavState) {
    let state_i = NavState::new(&exp_r(&Vector3::<Float>::new(0.1,-0.2,0.3)), &Vector3::<Float>::new(1.0,-0.5,2.0), &Vector3::<Float>::new(0.5,0.2,-0.1));
    let state_j = NavState::new(&exp_r(&Vector3::<Float>::new(0.25,-0.1,0.55)), &Vector3::<Float>::new(1.3,-0.4,2.05), &Vector3::<Float>::new(0.7,0.1,0.05));
    (state_i, state_j)
}

fn coriolis_options() -> Vec<CoriolisCompensation> {
    let earth_rate = Vector3::<Float>::new(0.1,-0.05,0.2);
    vec!(CoriolisCompensation::Disabled, CoriolisCompensation::FirstOrder(earth_rate), CoriolisCompensation::SecondOrder(earth_rate))
}

fn assert_jacobians_match(preintegrated: &PreintegratedMeasurement, state_i: &NavState, state_j: &NavState, bias: &ImuBias) {
    let evaluation = compute_error_with_jacobians(preintegrated, state_i, state_j, bias);
    assert_eq!(evaluation.residual, compute_error(preintegrated, state_i, state_j, bias));

    let retract = |s: &NavState, dx: &ImuTangent| s.retract(dx);
    let h_state_i = numerical_derivative_retract(|s: &NavState| compute_error(preintegrated, s, state_j, bias), state_i, retract, DEFAULT_DELTA);
    let h_state_j = numerical_derivative_retract(|s: &NavState| compute_error(preintegrated, state_i, s, bias), state_j, retract, DEFAULT_DELTA);
    let h_bias = numerical_derivative(|b: &Vector6<Float>| compute_error(preintegrated, state_i, state_j, &ImuBias::from_vector(b)), &bias.to_vector(), DEFAULT_DELTA);

    assert!((h_state_i - evaluation.jacobian_state_i).amax() < 1e-9);
    assert!((h_state_j - evaluation.jacobian_state_j).amax() < 1e-9);
    assert!((h_bias - evaluation.jacobian_bias).amax() < 1e-9);
}

#[test]
fn empty_preintegration_has_zero_residual() {
    let preintegrated = PreintegratedMeasurement::new(&PreintegrationParameters::z_down(9.8), &ImuBias::zeros()).unwrap();
    let state = NavState::identity();
    assert_eq!(compute_error(&preintegrated, &state, &state, &ImuBias::zeros()), ImuTangent::zeros());
}

#[test]
fn stationary_imu_has_zero_residual() {
    let mut preintegrated = PreintegratedMeasurement::new(&PreintegrationParameters::z_down(9.8), &ImuBias::zeros()).unwrap();
    for _ in 0..100 {
        preintegrated.integrate_measurement(&Vector3::<Float>::new(0.0,0.0,-9.8), &Vector3::<Float>::zeros(), 0.01).unwrap();
    }
    let state = NavState::new(&exp_r(&Vector3::<Float>::zeros()), &Vector3::<Float>::new(3.0,-2.0,1.0), &Vector3::<Float>::zeros());
    assert!(compute_error(&preintegrated, &state, &state, &ImuBias::zeros()).norm() < 1e-12);
}

#[test]
fn jacobians_at_zero_motion() {
    for coriolis in coriolis_options() {
        let parameters = PreintegrationParameters { coriolis, ..PreintegrationParameters::z_down(9.81) };
        let mut preintegrated = PreintegratedMeasurement::new(&parameters, &ImuBias::zeros()).unwrap();
        for _ in 0..10 {
            preintegrated.integrate_measurement(&Vector3::<Float>::new(0.0,0.0,-9.81), &Vector3::<Float>::zeros(), 0.01).unwrap();
        }
        let state = NavState::identity();
        assert_jacobians_match(&preintegrated, &state, &state, &ImuBias::zeros());
    }
}

#[test]
fn jacobians_at_large_motion() {
    let bias_hat = ImuBias::new(&Vector3::<Float>::new(0.02,-0.01,0.03), &Vector3::<Float>::new(1e-3,-2e-3,5e-4));
    let bias = ImuBias::new(&Vector3::<Float>::new(0.025,-0.012,0.028), &Vector3::<Float>::new(2e-3,-1e-3,1e-3));
    let (state_i, state_j) = moving_states();
    for coriolis in coriolis_options() {
        for &position_integration in [PositionIntegration::FirstOrder, PositionIntegration::SecondOrder].iter() {
            let parameters = PreintegrationParameters { position_integration, ..parameters_with(coriolis) };
            let preintegrated = moving_preintegration(&parameters, &bias_hat);
            assert_jacobians_match(&preintegrated, &state_i, &state_j, &bias);
        }
    }
}

#[test]
fn predicted_state_has_zero_residual() {
    let mut rng = thread_rng();
    let bias_hat = ImuBias::zeros();
    for coriolis in coriolis_options() {
        let preintegrated = moving_preintegration(&parameters_with(coriolis), &bias_hat);
        for _ in 0..5 {
            let bias = bias_hat.add_pertb(&Vector6::<Float>::from_fn(|_,_| rng.gen_range(-1e-3..1e-3)));
            let state_i = NavState::new(
                &exp_r(&Vector3::<Float>::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))),
                &Vector3::<Float>::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)),
                &Vector3::<Float>::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0)));
            let state_j = preintegrated.predict(&state_i, &bias);
            assert!(compute_error(&preintegrated, &state_i, &state_j, &bias).amax() < 1e-9);
        }
    }
}

#[test]
fn residual_reflects_state_error() {
    let preintegrated = moving_preintegration(&parameters_with(CoriolisCompensation::Disabled), &ImuBias::zeros());
    let (state_i, _) = moving_states();
    let state_j = preintegrated.predict(&state_i, &ImuBias::zeros());
    let xi = SVector::<Float,9>::from_column_slice(&[1e-3,-2e-3,0.5e-3,0.0,1e-3,0.0,0.0,0.0,2e-3]);
    let residual = compute_error(&preintegrated, &state_i, &state_j.retract(&xi), &ImuBias::zeros());
    // position and velocity errors of j show up rotated into body frame i
    let relative_rotation = state_i.rotation.transpose()*state_j.rotation;
    assert!((residual.fixed_rows::<3>(0) - relative_rotation*xi.fixed_rows::<3>(0)).norm() < 1e-12);
    assert!((residual.fixed_rows::<3>(3) - relative_rotation*xi.fixed_rows::<3>(3)).norm() < 1e-12);
    assert!((residual.fixed_rows::<3>(6) - xi.fixed_rows::<3>(6)).norm() < 1e-9);
}

#[test]
fn factor_requires_positive_definite_covariance() {
    let empty = PreintegratedMeasurement::new(&parameters_with(CoriolisCompensation::Disabled), &ImuBias::zeros()).unwrap();
    assert!(ImuFactor::new(KEYS, empty).is_err());

    let noiseless = moving_preintegration(&PreintegrationParameters::z_up(9.81), &ImuBias::zeros());
    assert!(ImuFactor::new(KEYS, noiseless).is_err());

    let factor = ImuFactor::new(KEYS, moving_preintegration(&parameters_with(CoriolisCompensation::Disabled), &ImuBias::zeros())).unwrap();
    assert_eq!(*factor.get_keys(), KEYS);
}

#[test]
fn whitened_cost_is_mahalanobis_distance() {
    let factor = ImuFactor::new(KEYS, moving_preintegration(&parameters_with(CoriolisCompensation::Disabled), &ImuBias::zeros())).unwrap();
    let (state_i, state_j) = moving_states();
    let residual = factor.compute_error(&state_i, &state_j, &ImuBias::zeros()).residual;

    let information = factor.get_preintegrated().get_covariance().try_inverse().unwrap();
    let expected_cost = (residual.transpose()*information*residual)[(0,0)];
    let cost = factor.compute_cost(&residual);
    assert!((cost - expected_cost).abs() < 1e-6*expected_cost);
    assert_eq!(cost, factor.whitened_error(&residual).norm_squared());

    assert_eq!(factor.get_noise_model().get_covariance(), factor.get_preintegrated().get_covariance());
    let sqrt_information = factor.get_noise_model().get_sqrt_information();
    assert!((sqrt_information.transpose()*sqrt_information - information).amax() < 1e-6*information.amax());
}

#[test]
fn pose_and_velocity_jacobians_match_numerical_derivative() {
    let parameters = parameters_with(CoriolisCompensation::SecondOrder(Vector3::<Float>::new(0.1,-0.05,0.2)));
    let factor = ImuFactor::new(KEYS, moving_preintegration(&parameters, &ImuBias::zeros())).unwrap();
    let (state_i, state_j) = moving_states();
    let pose_i = state_i.get_pose();
    let pose_j = state_j.get_pose();
    let (vel_i, vel_j) = (state_i.velocity, state_j.velocity);
    let bias = ImuBias::zeros();

    let evaluation = factor.evaluate_error(&pose_i, &vel_i, &pose_j, &vel_j, &bias);
    assert!((evaluation.residual - factor.compute_error(&state_i, &state_j, &bias).residual).amax() < 1e-12);

    let retract = |p: &Isometry3<Float>, dx: &Vector6<Float>| pose::retract(p, dx);
    let h_pose_i = numerical_derivative_retract(|p: &Isometry3<Float>| factor.evaluate_error(p, &vel_i, &pose_j, &vel_j, &bias).residual, &pose_i, retract, DEFAULT_DELTA);
    let h_pose_j = numerical_derivative_retract(|p: &Isometry3<Float>| factor.evaluate_error(&pose_i, &vel_i, p, &vel_j, &bias).residual, &pose_j, retract, DEFAULT_DELTA);
    let h_vel_i = numerical_derivative(|v: &Vector3<Float>| factor.evaluate_error(&pose_i, v, &pose_j, &vel_j, &bias).residual, &vel_i, DEFAULT_DELTA);
    let h_vel_j = numerical_derivative(|v: &Vector3<Float>| factor.evaluate_error(&pose_i, &vel_i, &pose_j, v, &bias).residual, &vel_j, DEFAULT_DELTA);

    assert!((h_pose_i - evaluation.jacobian_pose_i).amax() < 1e-8);
    assert!((h_pose_j - evaluation.jacobian_pose_j).amax() < 1e-8);
    assert!((h_vel_i - evaluation.jacobian_vel_i).amax() < 1e-8);
    assert!((h_vel_j - evaluation.jacobian_vel_j).amax() < 1e-8);
}

#[test]
fn parameters_yaml_round_trip() {
    let mut parameters = parameters_with(CoriolisCompensation::SecondOrder(Vector3::<Float>::new(0.0,4.5e-5,6.1e-5)));
    parameters.body_pose_sensor = Some(pose::from_parts(&Vector3::<Float>::new(0.1,0.0,-0.05), &exp_r(&Vector3::<Float>::new(0.0,0.0,0.5))));
    let yaml = parameters.to_yaml().unwrap();
    assert_eq!(PreintegrationParameters::from_yaml_str(&yaml).unwrap(), parameters);

    let path = std::env::temp_dir().join("preintegration_parameters_round_trip.yaml");
    std::fs::write(&path, &yaml).unwrap();
    assert_eq!(PreintegrationParameters::load(&path).unwrap(), parameters);
    std::fs::remove_file(&path).unwrap();

    let mut invalid = parameters.clone();
    invalid.accelerometer_covariance[(1,1)] = -1.0;
    assert!(PreintegrationParameters::from_yaml_str(&invalid.to_yaml().unwrap()).is_err());
    assert!(PreintegrationParameters::from_yaml_str("gravity: [0.0, 0.0").is_err());
    assert!(PreintegrationParameters::load(std::env::temp_dir().join("does_not_exist_preintegration.yaml")).is_err());
}

#[test]
fn lever_arm_is_compensated() {
    let omega = Vector3::<Float>::new(0.0,0.0,0.8);
    let lever_arm = Vector3::<Float>::new(0.2,0.0,0.0);
    let mut parameters = PreintegrationParameters::z_up(9.81);
    parameters.body_pose_sensor = Some(pose::from_parts(&lever_arm, &exp_r(&Vector3::<Float>::zeros())));

    // sensor on a spinning platform measures centripetal acceleration plus -g
    let centripetal = omega.cross(&omega.cross(&lever_arm));
    let measured_acc = centripetal - parameters.gravity;
    let mut preintegrated = PreintegratedMeasurement::new(&parameters, &ImuBias::zeros()).unwrap();
    for _ in 0..100 {
        preintegrated.integrate_measurement(&measured_acc, &omega, 0.01).unwrap();
    }
    let state_i = NavState::identity();
    let state_j = NavState::new(&exp_r(&(omega*1.0)), &Vector3::<Float>::zeros(), &Vector3::<Float>::zeros());
    assert!(compute_error(&preintegrated, &state_i, &state_j, &ImuBias::zeros()).norm() < 1e-9);
}

#[test]
fn local_coordinates_inverts_retract() {
    let mut rng = thread_rng();
    let (state_i, _) = moving_states();
    for _ in 0..10 {
        let xi = ImuTangent::from_fn(|_,_| rng.gen_range(-0.5..0.5));
        let other = state_i.retract(&xi);
        assert!((state_i.local_coordinates(&other) - xi).amax() < 1e-10);
        assert!(state_i.local_coordinates(&state_i).amax() < 1e-15);
    }
}
