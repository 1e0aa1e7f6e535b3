extern crate nalgebra as na;

use na::{Vector,Vector3,Vector6,Matrix3,Const,storage::Storage};
use serde::{Serialize, Deserialize};

use crate::odometry::imu_odometry::{ImuBiasJacobian,POSITION_OFFSET,VELOCITY_OFFSET,ROTATION_OFFSET};
use crate::numerics::lie::skew_symmetric;
use crate::Float;

/**
 * Accelerometer and gyroscope bias, assumed constant between two navigation states.
 * The tangent layout is (bias_a, bias_g).
 */
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct ImuBias {
    pub bias_a: Vector3<Float>,
    pub bias_g: Vector3<Float>
}

impl ImuBias {

    pub fn new(bias_a: &Vector3<Float>, bias_g: &Vector3<Float>) -> ImuBias {
        ImuBias { bias_a: *bias_a, bias_g: *bias_g }
    }

    pub fn zeros() -> ImuBias {
        ImuBias {
            bias_a: Vector3::<Float>::zeros(),
            bias_g: Vector3::<Float>::zeros()
        }
    }

    pub fn from_vector<R>(v: &Vector<Float,Const<6>,R>) -> ImuBias where R: Storage<Float,Const<6>,Const<1>> {
        ImuBias {
            bias_a: v.fixed_rows::<3>(0).into_owned(),
            bias_g: v.fixed_rows::<3>(3).into_owned()
        }
    }

    pub fn to_vector(&self) -> Vector6<Float> {
        let mut v = Vector6::<Float>::zeros();
        v.fixed_rows_mut::<3>(0).copy_from(&self.bias_a);
        v.fixed_rows_mut::<3>(3).copy_from(&self.bias_g);
        v
    }

    pub fn correct_accelerometer(&self, measured_acc: &Vector3<Float>) -> Vector3<Float> {
        measured_acc - self.bias_a
    }

    pub fn correct_gyroscope(&self, measured_omega: &Vector3<Float>) -> Vector3<Float> {
        measured_omega - self.bias_g
    }

    pub fn add_pertb<R>(&self, new_pertb: &Vector<Float,Const<6>,R>) -> ImuBias where R: Storage<Float,Const<6>,Const<1>> {
        ImuBias {
            bias_a: self.bias_a + new_pertb.fixed_rows::<3>(0),
            bias_g: self.bias_g + new_pertb.fixed_rows::<3>(3)
        }
    }

    /**
     * Difference self - reference
     */
    pub fn delta_from(&self, reference: &ImuBias) -> BiasDelta {
        BiasDelta {
            bias_a_delta: self.bias_a - reference.bias_a,
            bias_g_delta: self.bias_g - reference.bias_g
        }
    }
}

#[derive(Debug,Clone,Copy,PartialEq)]
pub struct BiasDelta {
    pub bias_a_delta: Vector3<Float>,
    pub bias_g_delta: Vector3<Float>
}

impl BiasDelta {

    pub fn to_vector(&self) -> Vector6<Float> {
        let mut v = Vector6::<Float>::zeros();
        v.fixed_rows_mut::<3>(0).copy_from(&self.bias_a_delta);
        v.fixed_rows_mut::<3>(3).copy_from(&self.bias_g_delta);
        v
    }
}

/**
 * Sensitivity of the corrected body frame measurement to the sensor bias.
 * Without a sensor pose the bias is subtracted directly, i.e. -I, 0, -I.
 */
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct MeasurementBiasJacobians {
    pub acceleration_jacobian_bias_a: Matrix3<Float>,
    pub acceleration_jacobian_bias_g: Matrix3<Float>,
    pub omega_jacobian_bias_g: Matrix3<Float>
}

impl MeasurementBiasJacobians {

    pub fn direct() -> MeasurementBiasJacobians {
        MeasurementBiasJacobians {
            acceleration_jacobian_bias_a: -Matrix3::<Float>::identity(),
            acceleration_jacobian_bias_g: Matrix3::<Float>::zeros(),
            omega_jacobian_bias_g: -Matrix3::<Float>::identity()
        }
    }
}

/**
 * Sensitivity of the preintegrated delta to the bias used during integration.
 * The rotation does not depend on the accelerometer bias.
 */
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct BiasJacobians {
    pub position_jacobian_bias_a: Matrix3<Float>,
    pub position_jacobian_bias_g: Matrix3<Float>,
    pub velocity_jacobian_bias_a: Matrix3<Float>,
    pub velocity_jacobian_bias_g: Matrix3<Float>,
    pub rotation_jacobian_bias_g: Matrix3<Float>
}

impl BiasJacobians {

    pub fn zeros() -> BiasJacobians {
        BiasJacobians {
            position_jacobian_bias_a: Matrix3::<Float>::zeros(),
            position_jacobian_bias_g: Matrix3::<Float>::zeros(),
            velocity_jacobian_bias_a: Matrix3::<Float>::zeros(),
            velocity_jacobian_bias_g: Matrix3::<Float>::zeros(),
            rotation_jacobian_bias_g: Matrix3::<Float>::zeros()
        }
    }

    /**
     * Advances the jacobians by one sample. rotation_i is the preintegrated rotation before
     * this sample is applied; the preintegrated delta itself must be advanced afterwards.
     * The rotation jacobian is w.r.t. a right perturbation: R(b + db) = R(b)*Exp(J*db).
     */
    pub fn propagate(&self, corrected_acc: &Vector3<Float>, measurement_jacobians: &MeasurementBiasJacobians, rotation_i: &Matrix3<Float>, rotation_incr: &Matrix3<Float>,
        right_jacobian_incr: &Matrix3<Float>, delta_t: Float, second_order_position: bool) -> BiasJacobians {

        // derivatives of the velocity increment R_i*a*dt
        let velocity_incr_bias_a = rotation_i*measurement_jacobians.acceleration_jacobian_bias_a*delta_t;
        let velocity_incr_bias_g = rotation_i*(measurement_jacobians.acceleration_jacobian_bias_g - skew_symmetric(corrected_acc)*self.rotation_jacobian_bias_g)*delta_t;

        let (position_jacobian_bias_a, position_jacobian_bias_g) = match second_order_position {
            true => (self.position_jacobian_bias_a + delta_t*(self.velocity_jacobian_bias_a + 0.5*velocity_incr_bias_a),
                     self.position_jacobian_bias_g + delta_t*(self.velocity_jacobian_bias_g + 0.5*velocity_incr_bias_g)),
            false => (self.position_jacobian_bias_a + self.velocity_jacobian_bias_a*delta_t,
                      self.position_jacobian_bias_g + self.velocity_jacobian_bias_g*delta_t)
        };

        BiasJacobians {
            position_jacobian_bias_a,
            position_jacobian_bias_g,
            velocity_jacobian_bias_a: self.velocity_jacobian_bias_a + velocity_incr_bias_a,
            velocity_jacobian_bias_g: self.velocity_jacobian_bias_g + velocity_incr_bias_g,
            rotation_jacobian_bias_g: rotation_incr.transpose()*self.rotation_jacobian_bias_g + right_jacobian_incr*measurement_jacobians.omega_jacobian_bias_g*delta_t
        }
    }

    /**
     * d(delta)/d(bias) with rows (position, velocity, rotation) and columns (bias_a, bias_g)
     */
    pub fn as_matrix(&self) -> ImuBiasJacobian {
        let mut jacobian = ImuBiasJacobian::zeros();
        jacobian.fixed_view_mut::<3,3>(POSITION_OFFSET,0).copy_from(&self.position_jacobian_bias_a);
        jacobian.fixed_view_mut::<3,3>(POSITION_OFFSET,3).copy_from(&self.position_jacobian_bias_g);
        jacobian.fixed_view_mut::<3,3>(VELOCITY_OFFSET,0).copy_from(&self.velocity_jacobian_bias_a);
        jacobian.fixed_view_mut::<3,3>(VELOCITY_OFFSET,3).copy_from(&self.velocity_jacobian_bias_g);
        jacobian.fixed_view_mut::<3,3>(ROTATION_OFFSET,3).copy_from(&self.rotation_jacobian_bias_g);
        jacobian
    }
}
