use nalgebra as na;

use na::Vector3;
use rand::prelude::*;
use rand_distr::{Normal,Distribution};
use color_eyre::eyre::{ensure, eyre, Result};

use crate::sensors::imu::imu_data_frame::ImuDataFrame;
use crate::odometry::imu_odometry::bias::ImuBias;
use crate::Float;

/**
 * Imu undergoing constant specific force and angular velocity in its own frame.
 * Measurements are corrupted by a constant bias and discrete white noise with
 * sigma = density/sqrt(dt).
 */
#[derive(Debug,Clone)]
pub struct ImuSimulator {
    pub specific_force: Vector3<Float>,
    pub angular_velocity: Vector3<Float>,
    pub bias: ImuBias,
    pub accelerometer_noise_density: Vector3<Float>,
    pub gyro_noise_density: Vector3<Float>,
    pub rate: Float,
    pub seed: u64
}

impl ImuSimulator {

    pub fn new(specific_force: &Vector3<Float>, angular_velocity: &Vector3<Float>, rate: Float) -> ImuSimulator {
        ImuSimulator {
            specific_force: *specific_force,
            angular_velocity: *angular_velocity,
            bias: ImuBias::zeros(),
            accelerometer_noise_density: Vector3::<Float>::zeros(),
            gyro_noise_density: Vector3::<Float>::zeros(),
            rate,
            seed: 0x0DDB1A5ECBAD5EEDu64
        }
    }

    /**
     * Stationary imu in a navigation frame with the given gravity. The accelerometer senses -g.
     */
    pub fn stationary(gravity: &Vector3<Float>, rate: Float) -> ImuSimulator {
        ImuSimulator::new(&(-gravity), &Vector3::<Float>::zeros(), rate)
    }

    pub fn with_bias(self, bias: &ImuBias) -> ImuSimulator {
        ImuSimulator { bias: *bias, ..self }
    }

    pub fn with_noise(self, accelerometer_noise_density: &Vector3<Float>, gyro_noise_density: &Vector3<Float>) -> ImuSimulator {
        ImuSimulator { accelerometer_noise_density: *accelerometer_noise_density, gyro_noise_density: *gyro_noise_density, ..self }
    }

    /**
     * Generates sample_count+1 timestamps starting at t0, i.e. sample_count time steps
     */
    pub fn generate(&self, t0: Float, sample_count: usize) -> Result<ImuDataFrame> {
        ensure!(self.rate.is_finite() && self.rate > 0.0, "imu rate has to be positive: {}", self.rate);
        let delta_t = 1.0/self.rate;
        let sqrt_delta_t = delta_t.sqrt();

        let mut sampling_thread = SmallRng::seed_from_u64(self.seed);
        let acc_noise = noise_distributions(&self.accelerometer_noise_density, sqrt_delta_t)?;
        let gyro_noise = noise_distributions(&self.gyro_noise_density, sqrt_delta_t)?;

        let mut imu_data = ImuDataFrame::from_data(vec!(), vec!(), vec!(), self.accelerometer_noise_density, self.gyro_noise_density)?;
        for i in 0..sample_count+1 {
            let acc_sample = Vector3::<Float>::from_fn(|r,_| acc_noise[r].sample(&mut sampling_thread));
            let gyro_sample = Vector3::<Float>::from_fn(|r,_| gyro_noise[r].sample(&mut sampling_thread));
            let measured_acc = self.specific_force + self.bias.bias_a + acc_sample;
            let measured_omega = self.angular_velocity + self.bias.bias_g + gyro_sample;
            imu_data.push(&measured_acc, &measured_omega, t0 + (i as Float)*delta_t);
        }
        Ok(imu_data)
    }
}

fn noise_distributions(noise_density: &Vector3<Float>, sqrt_delta_t: Float) -> Result<Vec<Normal<Float>>> {
    noise_density.iter().map(|density| Normal::new(0.0, density/sqrt_delta_t).map_err(|e| eyre!("invalid noise density {}: {}", density, e))).collect()
}
