extern crate nalgebra as na;

use na::{Vector,Vector3,Matrix3,Const,storage::Storage};

use crate::odometry::imu_odometry::{ImuTangent,POSITION_OFFSET,VELOCITY_OFFSET,ROTATION_OFFSET};
use crate::numerics::lie::exp_r;
use crate::Float;

/**
 * Relative motion accumulated since the start of an integration interval,
 * expressed in the body frame at the start of the interval.
 */
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct ImuDelta {
    pub delta_position: Vector3<Float>,
    pub delta_velocity: Vector3<Float>,
    pub delta_rotation_lie: Vector3<Float>
}

impl ImuDelta {

    pub fn empty() -> ImuDelta {
        ImuDelta {
            delta_position: Vector3::<Float>::zeros(),
            delta_velocity: Vector3::<Float>::zeros(),
            delta_rotation_lie: Vector3::<Float>::zeros()
        }
    }

    pub fn from_vector<R>(zeta: &Vector<Float,Const<9>,R>) -> ImuDelta where R: Storage<Float,Const<9>,Const<1>> {
        ImuDelta {
            delta_position: zeta.fixed_rows::<3>(POSITION_OFFSET).into_owned(),
            delta_velocity: zeta.fixed_rows::<3>(VELOCITY_OFFSET).into_owned(),
            delta_rotation_lie: zeta.fixed_rows::<3>(ROTATION_OFFSET).into_owned()
        }
    }

    pub fn to_vector(&self) -> ImuTangent {
        let mut zeta = ImuTangent::zeros();
        zeta.fixed_rows_mut::<3>(POSITION_OFFSET).copy_from(&self.delta_position);
        zeta.fixed_rows_mut::<3>(VELOCITY_OFFSET).copy_from(&self.delta_velocity);
        zeta.fixed_rows_mut::<3>(ROTATION_OFFSET).copy_from(&self.delta_rotation_lie);
        zeta
    }

    pub fn delta_rotation(&self) -> Matrix3<Float> {
        exp_r(&self.delta_rotation_lie)
    }

    pub fn norm(&self) -> Float {
        self.to_vector().norm()
    }
}
