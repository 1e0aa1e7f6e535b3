use nalgebra as na;

use na::Vector3;
use crate::Float;

pub mod imu_data_frame;
pub mod simulation;

/**
 * A single raw imu reading in the sensor frame, valid for delta_t seconds
 */
#[derive(Debug,Copy,Clone,PartialEq)]
pub struct ImuSample {
    pub acceleration: Vector3<Float>,
    pub angular_velocity: Vector3<Float>,
    pub delta_t: Float
}

impl ImuSample {
    pub fn new(acceleration: &Vector3<Float>, angular_velocity: &Vector3<Float>, delta_t: Float) -> ImuSample {
        ImuSample { acceleration: *acceleration, angular_velocity: *angular_velocity, delta_t }
    }
}
