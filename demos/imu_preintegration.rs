extern crate nalgebra as na;
extern crate preintegration;

use color_eyre::eyre::Result;
use na::Vector3;
use preintegration::odometry::imu_odometry::{bias::ImuBias, nav_state::NavState};
use preintegration::odometry::imu_odometry::preintegration::PreintegratedMeasurement;
use preintegration::odometry::imu_odometry::preintegration_parameters::PreintegrationParameters;
use preintegration::odometry::imu_odometry::factor::{FactorKeys,ImuFactor};
use preintegration::sensors::imu::simulation::ImuSimulator;
use preintegration::Float;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    // Optional path to a yaml file with PreintegrationParameters
    let parameters = match std::env::args().nth(1) {
        Some(path) => PreintegrationParameters::load(path)?,
        None => PreintegrationParameters::from_noise_densities(&Vector3::<Float>::repeat(2e-3), &Vector3::<Float>::repeat(1.7e-4), 1e-4, &Vector3::<Float>::new(0.0,0.0,-9.81))
    };
    println!("{}", parameters);

    let true_bias = ImuBias::new(&Vector3::<Float>::new(0.02,-0.01,0.05), &Vector3::<Float>::new(1e-3,-5e-4,2e-3));
    let imu_data = ImuSimulator::stationary(&parameters.gravity, 200.0)
        .with_bias(&true_bias)
        .with_noise(&parameters.accelerometer_covariance.diagonal().map(|v| v.sqrt()), &parameters.gyroscope_covariance.diagonal().map(|v| v.sqrt()))
        .generate(0.0, 400)?;

    let mut preintegrated = PreintegratedMeasurement::new(&parameters, &ImuBias::zeros())?;
    let sample_count = preintegrated.integrate_data_frame(&imu_data)?;
    println!("integrated {} samples over {} s", sample_count, preintegrated.get_delta_time());
    println!("delta: {:?}", preintegrated.get_delta());

    let keys = FactorKeys { pose_i: 0, vel_i: 1, pose_j: 2, vel_j: 3, bias: 4 };
    let factor = ImuFactor::new(keys, preintegrated)?;
    let state = NavState::identity();

    for (name, bias) in [("zero bias", ImuBias::zeros()), ("true bias", true_bias)].iter() {
        let evaluation = factor.compute_error(&state, &state, bias);
        println!("{}: residual {} cost {:e}", name, evaluation.residual.transpose(), factor.compute_cost(&evaluation.residual));
    }

    Ok(())
}
