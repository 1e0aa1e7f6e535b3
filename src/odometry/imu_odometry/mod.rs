extern crate nalgebra as na;

use na::{SMatrix,SVector};
use crate::Float;

pub mod bias;
pub mod factor;
pub mod imu_delta;
pub mod nav_state;
pub mod preintegration;
pub mod preintegration_parameters;

/// Tangent layout shared by the preintegrated delta, the navigation state and the residual
pub const POSITION_OFFSET: usize = 0;
pub const VELOCITY_OFFSET: usize = 3;
pub const ROTATION_OFFSET: usize = 6;

pub type ImuTangent = SVector<Float,9>;
pub type ImuResidual = SVector<Float,9>;
pub type ImuCovariance = SMatrix<Float,9,9>;
pub type ImuJacobian = SMatrix<Float,9,9>;
pub type ImuBiasJacobian = SMatrix<Float,9,6>;
pub type ImuInputJacobian = SMatrix<Float,9,3>;
