extern crate nalgebra as na;

use na::{Vector,Vector3,Matrix3,Isometry3,Const,storage::Storage};
use serde::{Serialize, Deserialize};

use crate::odometry::imu_odometry::{ImuTangent,POSITION_OFFSET,VELOCITY_OFFSET,ROTATION_OFFSET};
use crate::numerics::{lie::{exp_r,ln_r},pose};
use crate::Float;

/**
 * Navigation state: attitude, position and velocity in the navigation frame.
 * Perturbations are applied in the body frame:
 * R' = R*Exp(dθ), p' = p + R*dp, v' = v + R*dv
 */
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct NavState {
    pub rotation: Matrix3<Float>,
    pub position: Vector3<Float>,
    pub velocity: Vector3<Float>
}

impl NavState {

    pub fn identity() -> NavState {
        NavState {
            rotation: Matrix3::<Float>::identity(),
            position: Vector3::<Float>::zeros(),
            velocity: Vector3::<Float>::zeros()
        }
    }

    pub fn new(rotation: &Matrix3<Float>, position: &Vector3<Float>, velocity: &Vector3<Float>) -> NavState {
        NavState { rotation: *rotation, position: *position, velocity: *velocity }
    }

    pub fn from_pose(pose: &Isometry3<Float>, velocity: &Vector3<Float>) -> NavState {
        let (position, rotation) = pose::decomp(pose);
        NavState { rotation, position, velocity: *velocity }
    }

    pub fn get_pose(&self) -> Isometry3<Float> {
        pose::from_parts(&self.position, &self.rotation)
    }

    pub fn retract<R>(&self, xi: &Vector<Float,Const<9>,R>) -> NavState where R: Storage<Float,Const<9>,Const<1>> {
        NavState {
            rotation: self.rotation*exp_r(&xi.fixed_rows::<3>(ROTATION_OFFSET)),
            position: self.position + self.rotation*xi.fixed_rows::<3>(POSITION_OFFSET),
            velocity: self.velocity + self.rotation*xi.fixed_rows::<3>(VELOCITY_OFFSET)
        }
    }

    /**
     * Inverse of retract: self.retract(self.local_coordinates(other)) == other
     */
    pub fn local_coordinates(&self, other: &NavState) -> ImuTangent {
        let rotation_transpose = self.rotation.transpose();
        let mut xi = ImuTangent::zeros();
        xi.fixed_rows_mut::<3>(POSITION_OFFSET).copy_from(&(rotation_transpose*(other.position - self.position)));
        xi.fixed_rows_mut::<3>(VELOCITY_OFFSET).copy_from(&(rotation_transpose*(other.velocity - self.velocity)));
        xi.fixed_rows_mut::<3>(ROTATION_OFFSET).copy_from(&ln_r(&(rotation_transpose*other.rotation)));
        xi
    }
}
