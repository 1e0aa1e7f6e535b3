use nalgebra as na;

use na::Vector3;
use color_eyre::eyre::{ensure, Result};
use crate::sensors::imu::ImuSample;
use crate::Float;

/**
 * Synchronized accelerometer and gyroscope readings between two keyframes.
 * Sample k is held from imu_ts[k-1] to imu_ts[k], so the first timestamp only marks the start of the interval.
 */
#[derive(Debug,Clone)]
pub struct ImuDataFrame {
    pub accelerometer_noise_density: Vector3<Float>,
    pub gyro_noise_density: Vector3<Float>,
    pub acceleration_data: Vec<Vector3<Float>>,
    pub gyro_data: Vec<Vector3<Float>>,
    pub imu_ts: Vec<Float>
}

impl ImuDataFrame {

    pub fn from_data(acceleration_data: Vec<Vector3<Float>>, gyro_data: Vec<Vector3<Float>>, imu_ts: Vec<Float>,
        accelerometer_noise_density: Vector3<Float>, gyro_noise_density: Vector3<Float>) -> Result<ImuDataFrame> {
        ensure!(acceleration_data.len() == gyro_data.len() && gyro_data.len() == imu_ts.len(),
            "imu data length mismatch: acc {}, gyro {}, ts {}", acceleration_data.len(), gyro_data.len(), imu_ts.len());
        Ok(ImuDataFrame {
            accelerometer_noise_density,
            gyro_noise_density,
            acceleration_data,
            gyro_data,
            imu_ts
        })
    }

    pub fn push(&mut self, acceleration: &Vector3<Float>, angular_velocity: &Vector3<Float>, ts: Float) -> () {
        self.acceleration_data.push(*acceleration);
        self.gyro_data.push(*angular_velocity);
        self.imu_ts.push(ts);
    }

    pub fn count(&self) -> usize {
        self.imu_ts.len()
    }

    /**
     * Samples with the time step to the previous timestamp. Fails if the timestamps are not strictly increasing.
     */
    pub fn samples(&self) -> Result<Vec<ImuSample>> {
        ensure!(self.acceleration_data.len() == self.imu_ts.len() && self.gyro_data.len() == self.imu_ts.len(), "imu data length mismatch");
        let mut samples = Vec::<ImuSample>::with_capacity(self.count().saturating_sub(1));
        for i in 1..self.count() {
            let delta_t = self.imu_ts[i] - self.imu_ts[i-1];
            ensure!(delta_t > 0.0, "imu timestamps are not strictly increasing at index {}: {} -> {}", i, self.imu_ts[i-1], self.imu_ts[i]);
            samples.push(ImuSample::new(&self.acceleration_data[i], &self.gyro_data[i], delta_t));
        }
        Ok(samples)
    }
}
