extern crate nalgebra as na;

use na::{Vector3,Matrix3};
use color_eyre::eyre::{ensure, Result};
use log::{debug, trace};

use crate::odometry::imu_odometry::{ImuTangent,ImuCovariance,ImuJacobian,ImuBiasJacobian,ImuInputJacobian,POSITION_OFFSET,VELOCITY_OFFSET,ROTATION_OFFSET};
use crate::odometry::imu_odometry::{imu_delta::ImuDelta, bias::{ImuBias,BiasJacobians,MeasurementBiasJacobians}, nav_state::NavState};
use crate::odometry::imu_odometry::preintegration_parameters::{PreintegrationParameters,PositionIntegration};
use crate::numerics::lie::{exp_r,ln_r,skew_symmetric,right_jacobian,right_inverse_jacobian};
use crate::sensors::imu::{ImuSample,imu_data_frame::ImuDataFrame};
use crate::Float;

/**
 * Result of a single state update together with its jacobians
 * w.r.t. the previous delta, the acceleration and the angular rate.
 */
#[derive(Debug,Clone)]
pub struct EstimateUpdate {
    pub delta: ImuDelta,
    pub jacobian_delta: ImuJacobian,
    pub jacobian_acceleration: ImuInputJacobian,
    pub jacobian_omega: ImuInputJacobian
}

/**
 * Advances the preintegrated delta by one (corrected) measurement.
 * Velocity and position are integrated with the rotation before this sample is applied.
 */
pub fn update_estimate(acceleration: &Vector3<Float>, omega: &Vector3<Float>, delta_t: Float, delta: &ImuDelta, position_integration: PositionIntegration) -> ImuDelta {
    let rotation_i = delta.delta_rotation();
    let rotation_incr = exp_r(&(omega*delta_t));
    advance(acceleration, delta_t, delta, &rotation_i, &rotation_incr, position_integration)
}

pub fn update_estimate_with_jacobians(acceleration: &Vector3<Float>, omega: &Vector3<Float>, delta_t: Float, delta: &ImuDelta, position_integration: PositionIntegration) -> EstimateUpdate {
    let theta_incr = omega*delta_t;
    let rotation_i = delta.delta_rotation();
    let rotation_incr = exp_r(&theta_incr);
    let new_delta = advance(acceleration, delta_t, delta, &rotation_i, &rotation_incr, position_integration);

    let jr_theta_i = right_jacobian(&delta.delta_rotation_lie);
    let jr_inv_theta_j = right_inverse_jacobian(&new_delta.delta_rotation_lie);
    let jr_theta_incr = right_jacobian(&theta_incr);

    // derivative of R*a w.r.t. theta
    let a_nav_h_theta = -rotation_i*skew_symmetric(acceleration)*jr_theta_i;

    let mut jacobian_delta = ImuJacobian::identity();
    jacobian_delta.fixed_view_mut::<3,3>(POSITION_OFFSET,VELOCITY_OFFSET).copy_from(&(Matrix3::<Float>::identity()*delta_t));
    jacobian_delta.fixed_view_mut::<3,3>(VELOCITY_OFFSET,ROTATION_OFFSET).copy_from(&(a_nav_h_theta*delta_t));
    jacobian_delta.fixed_view_mut::<3,3>(ROTATION_OFFSET,ROTATION_OFFSET).copy_from(&(jr_inv_theta_j*rotation_incr.transpose()*jr_theta_i));

    let mut jacobian_acceleration = ImuInputJacobian::zeros();
    jacobian_acceleration.fixed_view_mut::<3,3>(VELOCITY_OFFSET,0).copy_from(&(rotation_i*delta_t));

    if position_integration == PositionIntegration::SecondOrder {
        let dt22 = 0.5*delta_t*delta_t;
        jacobian_delta.fixed_view_mut::<3,3>(POSITION_OFFSET,ROTATION_OFFSET).copy_from(&(a_nav_h_theta*dt22));
        jacobian_acceleration.fixed_view_mut::<3,3>(POSITION_OFFSET,0).copy_from(&(rotation_i*dt22));
    }

    let mut jacobian_omega = ImuInputJacobian::zeros();
    jacobian_omega.fixed_view_mut::<3,3>(ROTATION_OFFSET,0).copy_from(&(jr_inv_theta_j*jr_theta_incr*delta_t));

    EstimateUpdate {
        delta: new_delta,
        jacobian_delta,
        jacobian_acceleration,
        jacobian_omega
    }
}

fn advance(acceleration: &Vector3<Float>, delta_t: Float, delta: &ImuDelta, rotation_i: &Matrix3<Float>, rotation_incr: &Matrix3<Float>, position_integration: PositionIntegration) -> ImuDelta {
    let a_nav_dt = rotation_i*acceleration*delta_t;
    let delta_position = match position_integration {
        PositionIntegration::FirstOrder => delta.delta_position + delta.delta_velocity*delta_t,
        PositionIntegration::SecondOrder => delta.delta_position + delta.delta_velocity*delta_t + 0.5*a_nav_dt*delta_t
    };

    ImuDelta {
        delta_position,
        delta_velocity: delta.delta_velocity + a_nav_dt,
        delta_rotation_lie: ln_r(&(rotation_i*rotation_incr))
    }
}

/**
 * Outcome of absorbing one sample: the next preintegrated measurement, the transition
 * matrix F of the linearized error state and the noise input matrix G, which maps
 * (integration, accelerometer, gyroscope) noise into the error state.
 */
#[derive(Debug,Clone)]
pub struct IntegrationStep {
    pub preintegrated: PreintegratedMeasurement,
    pub transition: ImuJacobian,
    pub noise_input: ImuJacobian
}

/**
 * Preintegrated imu measurements between two navigation states.
 * Samples are absorbed in order, one at a time; a finished instance is read only.
 */
#[derive(Debug,Clone)]
pub struct PreintegratedMeasurement {
    parameters: PreintegrationParameters,
    bias_hat: ImuBias,
    delta: ImuDelta,
    covariance: ImuCovariance,
    bias_jacobians: BiasJacobians,
    delta_time: Float,
    measurement_covariance: ImuCovariance
}

impl PreintegratedMeasurement {

    pub fn new(parameters: &PreintegrationParameters, bias_hat: &ImuBias) -> Result<PreintegratedMeasurement> {
        parameters.validate()?;
        Ok(PreintegratedMeasurement {
            parameters: *parameters,
            bias_hat: *bias_hat,
            delta: ImuDelta::empty(),
            covariance: ImuCovariance::zeros(),
            bias_jacobians: BiasJacobians::zeros(),
            delta_time: 0.0,
            measurement_covariance: parameters.measurement_covariance()
        })
    }

    pub fn reset_integration(&mut self) -> () {
        self.delta = ImuDelta::empty();
        self.covariance = ImuCovariance::zeros();
        self.bias_jacobians = BiasJacobians::zeros();
        self.delta_time = 0.0;
    }

    pub fn get_parameters(&self) -> &PreintegrationParameters {
        &self.parameters
    }

    pub fn get_bias_hat(&self) -> &ImuBias {
        &self.bias_hat
    }

    pub fn get_delta(&self) -> &ImuDelta {
        &self.delta
    }

    pub fn get_covariance(&self) -> &ImuCovariance {
        &self.covariance
    }

    pub fn get_bias_jacobians(&self) -> &BiasJacobians {
        &self.bias_jacobians
    }

    pub fn get_delta_time(&self) -> Float {
        self.delta_time
    }

    /**
     * Removes the bias estimate and, if the imu is not at the body origin, rotates the
     * measurements into the body frame and removes the centrifugal acceleration of the lever arm.
     */
    pub fn correct_measurement(&self, measured_acc: &Vector3<Float>, measured_omega: &Vector3<Float>) -> (Vector3<Float>,Vector3<Float>) {
        let (corrected_acc, corrected_omega, _) = self.correct_measurement_with_jacobians(measured_acc, measured_omega);
        (corrected_acc, corrected_omega)
    }

    /**
     * Same as correct_measurement, additionally returns the derivatives of the corrected
     * acceleration and angular rate w.r.t. the bias.
     */
    pub fn correct_measurement_with_jacobians(&self, measured_acc: &Vector3<Float>, measured_omega: &Vector3<Float>) -> (Vector3<Float>,Vector3<Float>,MeasurementBiasJacobians) {
        let unbiased_acc = self.bias_hat.correct_accelerometer(measured_acc);
        let unbiased_omega = self.bias_hat.correct_gyroscope(measured_omega);

        match &self.parameters.body_pose_sensor {
            None => (unbiased_acc, unbiased_omega, MeasurementBiasJacobians::direct()),
            Some(body_pose_sensor) => {
                let body_rotation_sensor = body_pose_sensor.rotation.to_rotation_matrix().matrix().into_owned();
                let lever_arm = body_pose_sensor.translation.vector;
                let corrected_omega = body_rotation_sensor*unbiased_omega;
                let omega_x = skew_symmetric(&corrected_omega);
                let corrected_acc = body_rotation_sensor*unbiased_acc - omega_x*omega_x*lever_arm;

                // d(w x (w x t))/dw = (w.t)I + w*t^T - 2*t*w^T
                let centrifugal_h_omega = Matrix3::<Float>::identity()*corrected_omega.dot(&lever_arm) + corrected_omega*lever_arm.transpose() - 2.0*lever_arm*corrected_omega.transpose();
                let measurement_jacobians = MeasurementBiasJacobians {
                    acceleration_jacobian_bias_a: -body_rotation_sensor,
                    acceleration_jacobian_bias_g: centrifugal_h_omega*body_rotation_sensor,
                    omega_jacobian_bias_g: -body_rotation_sensor
                };
                (corrected_acc, corrected_omega, measurement_jacobians)
            }
        }
    }

    /**
     * Absorbs one sample without modifying self.
     * NOTE: the bias jacobians and the covariance are linearized at the rotation before this sample,
     * so they have to be computed from the old values before the delta is advanced.
     */
    pub fn propagate(&self, measured_acc: &Vector3<Float>, measured_omega: &Vector3<Float>, delta_t: Float) -> Result<IntegrationStep> {
        ensure!(delta_t.is_finite() && delta_t > 0.0, "imu sample delta t has to be positive, got {}", delta_t);
        ensure!(measured_acc.iter().chain(measured_omega.iter()).all(|v| v.is_finite()), "imu sample is not finite: acc {} omega {}", measured_acc, measured_omega);

        let (corrected_acc, corrected_omega, measurement_jacobians) = self.correct_measurement_with_jacobians(measured_acc, measured_omega);
        let position_integration = self.parameters.position_integration;

        let theta_incr = corrected_omega*delta_t;
        let rotation_incr = exp_r(&theta_incr);
        let jr_theta_incr = right_jacobian(&theta_incr);

        let theta_i = self.delta.delta_rotation_lie;
        let rotation_i = exp_r(&theta_i);
        let jr_theta_i = right_jacobian(&theta_i);

        let bias_jacobians = self.bias_jacobians.propagate(&corrected_acc, &measurement_jacobians, &rotation_i, &rotation_incr, &jr_theta_incr, delta_t, position_integration == PositionIntegration::SecondOrder);

        let delta = advance(&corrected_acc, delta_t, &self.delta, &rotation_i, &rotation_incr, position_integration);

        let theta_j = delta.delta_rotation_lie;
        let jr_inv_theta_j = right_inverse_jacobian(&theta_j);

        let h_vel_angles = -rotation_i*skew_symmetric(&corrected_acc)*jr_theta_i*delta_t;
        let h_angles_angles = jr_inv_theta_j*rotation_incr.transpose()*jr_theta_i;

        //   pos          vel             angle
        //   I            I*dt            0
        //   0            I               h_vel_angles
        //   0            0               h_angles_angles
        let mut transition = ImuJacobian::identity();
        transition.fixed_view_mut::<3,3>(POSITION_OFFSET,VELOCITY_OFFSET).copy_from(&(Matrix3::<Float>::identity()*delta_t));
        transition.fixed_view_mut::<3,3>(VELOCITY_OFFSET,ROTATION_OFFSET).copy_from(&h_vel_angles);
        transition.fixed_view_mut::<3,3>(ROTATION_OFFSET,ROTATION_OFFSET).copy_from(&h_angles_angles);

        //   int noise    acc noise       gyro noise
        let mut noise_input = ImuJacobian::zeros();
        noise_input.fixed_view_mut::<3,3>(POSITION_OFFSET,0).copy_from(&(Matrix3::<Float>::identity()*delta_t));
        noise_input.fixed_view_mut::<3,3>(VELOCITY_OFFSET,3).copy_from(&(rotation_i*delta_t));
        noise_input.fixed_view_mut::<3,3>(ROTATION_OFFSET,6).copy_from(&(jr_inv_theta_j*jr_theta_incr*delta_t));

        // first order propagation, dt turns the continuous time noise into discrete time noise
        let covariance = transition*self.covariance*transition.transpose() + self.measurement_covariance*delta_t;
        let covariance = 0.5*(covariance + covariance.transpose());

        let preintegrated = PreintegratedMeasurement {
            parameters: self.parameters,
            bias_hat: self.bias_hat,
            delta,
            covariance,
            bias_jacobians,
            delta_time: self.delta_time + delta_t,
            measurement_covariance: self.measurement_covariance
        };

        Ok(IntegrationStep { preintegrated, transition, noise_input })
    }

    pub fn integrate_measurement(&mut self, measured_acc: &Vector3<Float>, measured_omega: &Vector3<Float>, delta_t: Float) -> Result<()> {
        let step = self.propagate(measured_acc, measured_omega, delta_t)?;
        *self = step.preintegrated;
        trace!("integrated dt: {}, total dt: {}, cov trace: {:+e}", delta_t, self.delta_time, self.covariance.trace());
        Ok(())
    }

    pub fn integrate_sample(&mut self, sample: &ImuSample) -> Result<()> {
        self.integrate_measurement(&sample.acceleration, &sample.angular_velocity, sample.delta_t)
    }

    /**
     * Integrates all samples of the frame. Returns the number of integrated samples.
     * Nothing is integrated if the frame is invalid.
     */
    pub fn integrate_data_frame(&mut self, imu_data: &ImuDataFrame) -> Result<usize> {
        let samples = imu_data.samples()?;
        let mut next = self.clone();
        for sample in &samples {
            next.integrate_sample(sample)?;
        }
        *self = next;
        debug!("integrated {} imu samples over {} s", samples.len(), self.delta_time);
        Ok(samples.len())
    }

    /**
     * Delta corrected to first order for a new bias estimate and its jacobian w.r.t. the bias
     */
    pub fn bias_corrected_delta(&self, bias: &ImuBias) -> (ImuTangent, ImuBiasJacobian) {
        let bias_delta = bias.delta_from(&self.bias_hat);
        let bias_jacobian_matrix = self.bias_jacobians.as_matrix();

        let mut corrected = self.delta.to_vector() + bias_jacobian_matrix*bias_delta.to_vector();
        let mut jacobian = bias_jacobian_matrix;

        let rotation_correction = self.bias_jacobians.rotation_jacobian_bias_g*bias_delta.bias_g_delta;
        let theta_corrected = ln_r(&(self.delta.delta_rotation()*exp_r(&rotation_correction)));
        corrected.fixed_rows_mut::<3>(ROTATION_OFFSET).copy_from(&theta_corrected);
        let theta_h_bias_g = right_inverse_jacobian(&theta_corrected)*right_jacobian(&rotation_correction)*self.bias_jacobians.rotation_jacobian_bias_g;
        jacobian.fixed_view_mut::<3,3>(ROTATION_OFFSET,3).copy_from(&theta_h_bias_g);

        (corrected, jacobian)
    }

    /**
     * Navigation state at j predicted from the state at i, the preintegrated delta and a bias estimate
     */
    pub fn predict(&self, state_i: &NavState, bias: &ImuBias) -> NavState {
        let (corrected, _) = self.bias_corrected_delta(bias);
        let dt = self.delta_time;
        let dt_sqr = dt*dt;
        let gravity = self.parameters.gravity;
        let earth_rate = self.parameters.coriolis.angular_rate();
        let earth_rate_x = skew_symmetric(&earth_rate);
        let rotation_i = &state_i.rotation;

        let mut position = state_i.position + rotation_i*corrected.fixed_rows::<3>(POSITION_OFFSET) + state_i.velocity*dt + 0.5*gravity*dt_sqr - earth_rate_x*state_i.velocity*dt_sqr;
        let mut velocity = state_i.velocity + rotation_i*corrected.fixed_rows::<3>(VELOCITY_OFFSET) + gravity*dt - 2.0*earth_rate_x*state_i.velocity*dt;
        if self.parameters.coriolis.is_second_order() {
            let centrifugal = earth_rate_x*earth_rate_x*state_i.position;
            position -= 0.5*centrifugal*dt_sqr;
            velocity -= centrifugal*dt;
        }
        let theta_coriolis = corrected.fixed_rows::<3>(ROTATION_OFFSET) - rotation_i.transpose()*earth_rate*dt;
        let rotation = rotation_i*exp_r(&theta_coriolis);

        NavState { rotation, position, velocity }
    }
}
