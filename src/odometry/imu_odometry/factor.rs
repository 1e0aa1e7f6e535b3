extern crate nalgebra as na;

use na::{Vector3,Matrix3,Isometry3,SMatrix};
use color_eyre::eyre::{eyre, Result};
use log::debug;

use crate::odometry::imu_odometry::{ImuResidual,ImuCovariance,ImuJacobian,ImuBiasJacobian,POSITION_OFFSET,VELOCITY_OFFSET,ROTATION_OFFSET};
use crate::odometry::imu_odometry::{preintegration::PreintegratedMeasurement, bias::ImuBias, nav_state::NavState};
use crate::numerics::lie::{exp_r,ln_r,skew_symmetric,right_jacobian,right_inverse_jacobian};
use crate::Float;

pub type PoseJacobian = SMatrix<Float,9,6>;
pub type VelocityJacobian = SMatrix<Float,9,3>;
pub type Key = u64;

/**
 * Residual together with its jacobians w.r.t. the navigation states at i and j (body frame perturbations)
 * and the bias (accelerometer, gyroscope).
 */
#[derive(Debug,Clone)]
pub struct ErrorEvaluation {
    pub residual: ImuResidual,
    pub jacobian_state_i: ImuJacobian,
    pub jacobian_state_j: ImuJacobian,
    pub jacobian_bias: ImuBiasJacobian
}

pub fn compute_error(preintegrated: &PreintegratedMeasurement, state_i: &NavState, state_j: &NavState, bias: &ImuBias) -> ImuResidual {
    compute_error_with_jacobians(preintegrated, state_i, state_j, bias).residual
}

/**
 * Difference between the motion implied by the two states and the bias corrected preintegrated delta,
 * expressed in the body frame at i:
 * r_p = R_i^T*(p_j - p_i - v_i*dt - 0.5*g*dt^2 + coriolis) - dp
 * r_v = R_i^T*(v_j - v_i - g*dt + coriolis) - dv
 * r_θ = Log(Exp(θ - R_i^T*w_earth*dt)^T * R_i^T * R_j)
 */
pub fn compute_error_with_jacobians(preintegrated: &PreintegratedMeasurement, state_i: &NavState, state_j: &NavState, bias: &ImuBias) -> ErrorEvaluation {
    let parameters = preintegrated.get_parameters();
    let dt = preintegrated.get_delta_time();
    let dt_sqr = dt*dt;
    let gravity = parameters.gravity;
    let earth_rate = parameters.coriolis.angular_rate();
    let second_order_coriolis = parameters.coriolis.is_second_order();
    let earth_rate_x = skew_symmetric(&earth_rate);
    let earth_rate_x_sqr = earth_rate_x*earth_rate_x;
    let identity = Matrix3::<Float>::identity();

    let (corrected, corrected_h_bias) = preintegrated.bias_corrected_delta(bias);

    let rotation_i = &state_i.rotation;
    let rotation_i_t = rotation_i.transpose();

    let mut position_nav = state_j.position - state_i.position - state_i.velocity*dt - 0.5*gravity*dt_sqr + earth_rate_x*state_i.velocity*dt_sqr;
    let mut velocity_nav = state_j.velocity - state_i.velocity - gravity*dt + 2.0*earth_rate_x*state_i.velocity*dt;
    if second_order_coriolis {
        position_nav += 0.5*earth_rate_x_sqr*state_i.position*dt_sqr;
        velocity_nav += earth_rate_x_sqr*state_i.position*dt;
    }
    let position_body = rotation_i_t*position_nav;
    let velocity_body = rotation_i_t*velocity_nav;

    let earth_rate_body = rotation_i_t*earth_rate;
    let theta_coriolis = corrected.fixed_rows::<3>(ROTATION_OFFSET) - earth_rate_body*dt;
    let relative_rotation = rotation_i_t*state_j.rotation;
    let rotation_residual = ln_r(&(exp_r(&theta_coriolis).transpose()*relative_rotation));

    let mut residual = ImuResidual::zeros();
    residual.fixed_rows_mut::<3>(POSITION_OFFSET).copy_from(&(position_body - corrected.fixed_rows::<3>(POSITION_OFFSET)));
    residual.fixed_rows_mut::<3>(VELOCITY_OFFSET).copy_from(&(velocity_body - corrected.fixed_rows::<3>(VELOCITY_OFFSET)));
    residual.fixed_rows_mut::<3>(ROTATION_OFFSET).copy_from(&rotation_residual);

    let jr_inv_residual = right_inverse_jacobian(&rotation_residual);
    let residual_h_theta_coriolis = -jr_inv_residual*exp_r(&rotation_residual).transpose()*right_jacobian(&theta_coriolis);

    let (position_h_position_i, velocity_h_position_i) = match second_order_coriolis {
        true => (rotation_i_t*(-identity + 0.5*dt_sqr*earth_rate_x_sqr)*rotation_i, rotation_i_t*(dt*earth_rate_x_sqr)*rotation_i),
        false => (-identity, Matrix3::<Float>::zeros())
    };
    let position_h_velocity_i = rotation_i_t*(-identity*dt + dt_sqr*earth_rate_x)*rotation_i;
    let velocity_h_velocity_i = rotation_i_t*(-identity + 2.0*dt*earth_rate_x)*rotation_i;
    let rotation_h_rotation_i = -jr_inv_residual*relative_rotation.transpose() - residual_h_theta_coriolis*skew_symmetric(&earth_rate_body)*dt;

    let mut jacobian_state_i = ImuJacobian::zeros();
    jacobian_state_i.fixed_view_mut::<3,3>(POSITION_OFFSET,POSITION_OFFSET).copy_from(&position_h_position_i);
    jacobian_state_i.fixed_view_mut::<3,3>(POSITION_OFFSET,VELOCITY_OFFSET).copy_from(&position_h_velocity_i);
    jacobian_state_i.fixed_view_mut::<3,3>(POSITION_OFFSET,ROTATION_OFFSET).copy_from(&skew_symmetric(&position_body));
    jacobian_state_i.fixed_view_mut::<3,3>(VELOCITY_OFFSET,POSITION_OFFSET).copy_from(&velocity_h_position_i);
    jacobian_state_i.fixed_view_mut::<3,3>(VELOCITY_OFFSET,VELOCITY_OFFSET).copy_from(&velocity_h_velocity_i);
    jacobian_state_i.fixed_view_mut::<3,3>(VELOCITY_OFFSET,ROTATION_OFFSET).copy_from(&skew_symmetric(&velocity_body));
    jacobian_state_i.fixed_view_mut::<3,3>(ROTATION_OFFSET,ROTATION_OFFSET).copy_from(&rotation_h_rotation_i);

    let mut jacobian_state_j = ImuJacobian::zeros();
    jacobian_state_j.fixed_view_mut::<3,3>(POSITION_OFFSET,POSITION_OFFSET).copy_from(&relative_rotation);
    jacobian_state_j.fixed_view_mut::<3,3>(VELOCITY_OFFSET,VELOCITY_OFFSET).copy_from(&relative_rotation);
    jacobian_state_j.fixed_view_mut::<3,3>(ROTATION_OFFSET,ROTATION_OFFSET).copy_from(&jr_inv_residual);

    let mut jacobian_bias = -corrected_h_bias;
    jacobian_bias.fixed_view_mut::<3,6>(ROTATION_OFFSET,0).copy_from(&(residual_h_theta_coriolis*corrected_h_bias.fixed_view::<3,6>(ROTATION_OFFSET,0)));

    ErrorEvaluation {
        residual,
        jacobian_state_i,
        jacobian_state_j,
        jacobian_bias
    }
}

/**
 * Zero mean gaussian with full covariance. Residuals are whitened with the inverse
 * of the lower cholesky factor so that |whiten(r)|^2 = r^T*P^-1*r
 */
#[derive(Debug,Clone)]
pub struct GaussianNoiseModel {
    covariance: ImuCovariance,
    sqrt_information: ImuCovariance
}

impl GaussianNoiseModel {

    pub fn from_covariance(covariance: &ImuCovariance) -> Result<GaussianNoiseModel> {
        let cholesky = covariance.cholesky().ok_or_else(|| eyre!("preintegrated covariance is not positive definite: {}", covariance))?;
        let sqrt_information = cholesky.l().try_inverse().ok_or_else(|| eyre!("cholesky factor of the preintegrated covariance is singular"))?;
        Ok(GaussianNoiseModel { covariance: *covariance, sqrt_information })
    }

    pub fn get_covariance(&self) -> &ImuCovariance {
        &self.covariance
    }

    pub fn get_sqrt_information(&self) -> &ImuCovariance {
        &self.sqrt_information
    }

    pub fn whiten(&self, residual: &ImuResidual) -> ImuResidual {
        self.sqrt_information*residual
    }
}

/**
 * Identifiers of the variables the factor connects
 */
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub struct FactorKeys {
    pub pose_i: Key,
    pub vel_i: Key,
    pub pose_j: Key,
    pub vel_j: Key,
    pub bias: Key
}

/**
 * Residual and jacobians per variable. Poses are perturbed as (dp, dθ) in the body frame,
 * velocities are perturbed additively in the navigation frame.
 */
#[derive(Debug,Clone)]
pub struct FactorEvaluation {
    pub residual: ImuResidual,
    pub jacobian_pose_i: PoseJacobian,
    pub jacobian_vel_i: VelocityJacobian,
    pub jacobian_pose_j: PoseJacobian,
    pub jacobian_vel_j: VelocityJacobian,
    pub jacobian_bias: ImuBiasJacobian
}

/**
 * Relative motion constraint between two navigation states from a finished preintegration.
 */
#[derive(Debug,Clone)]
pub struct ImuFactor {
    keys: FactorKeys,
    preintegrated: PreintegratedMeasurement,
    noise_model: GaussianNoiseModel
}

impl ImuFactor {

    pub fn new(keys: FactorKeys, preintegrated: PreintegratedMeasurement) -> Result<ImuFactor> {
        let noise_model = GaussianNoiseModel::from_covariance(preintegrated.get_covariance())?;
        debug!("imu factor {:?}, dt: {}, params: {}", keys, preintegrated.get_delta_time(), preintegrated.get_parameters());
        Ok(ImuFactor { keys, preintegrated, noise_model })
    }

    pub fn get_keys(&self) -> &FactorKeys {
        &self.keys
    }

    pub fn get_preintegrated(&self) -> &PreintegratedMeasurement {
        &self.preintegrated
    }

    pub fn get_noise_model(&self) -> &GaussianNoiseModel {
        &self.noise_model
    }

    pub fn compute_error(&self, state_i: &NavState, state_j: &NavState, bias: &ImuBias) -> ErrorEvaluation {
        compute_error_with_jacobians(&self.preintegrated, state_i, state_j, bias)
    }

    pub fn evaluate_error(&self, pose_i: &Isometry3<Float>, vel_i: &Vector3<Float>, pose_j: &Isometry3<Float>, vel_j: &Vector3<Float>, bias: &ImuBias) -> FactorEvaluation {
        let state_i = NavState::from_pose(pose_i, vel_i);
        let state_j = NavState::from_pose(pose_j, vel_j);
        let evaluation = self.compute_error(&state_i, &state_j, bias);

        let (jacobian_pose_i, jacobian_vel_i) = split_state_jacobian(&evaluation.jacobian_state_i, &state_i.rotation);
        let (jacobian_pose_j, jacobian_vel_j) = split_state_jacobian(&evaluation.jacobian_state_j, &state_j.rotation);

        FactorEvaluation {
            residual: evaluation.residual,
            jacobian_pose_i,
            jacobian_vel_i,
            jacobian_pose_j,
            jacobian_vel_j,
            jacobian_bias: evaluation.jacobian_bias
        }
    }

    pub fn whitened_error(&self, residual: &ImuResidual) -> ImuResidual {
        self.noise_model.whiten(residual)
    }

    /**
     * Squared mahalanobis distance r^T*P^-1*r
     */
    pub fn compute_cost(&self, residual: &ImuResidual) -> Float {
        self.whitened_error(residual).norm_squared()
    }
}

/**
 * Splits a jacobian w.r.t. a body frame NavState perturbation into the pose (dp, dθ) block and
 * the block w.r.t. the navigation frame velocity (dv_body = R^T*dv_nav).
 */
fn split_state_jacobian(jacobian: &ImuJacobian, rotation: &Matrix3<Float>) -> (PoseJacobian,VelocityJacobian) {
    let mut jacobian_pose = PoseJacobian::zeros();
    jacobian_pose.fixed_view_mut::<9,3>(0,0).copy_from(&jacobian.fixed_view::<9,3>(0,POSITION_OFFSET));
    jacobian_pose.fixed_view_mut::<9,3>(0,3).copy_from(&jacobian.fixed_view::<9,3>(0,ROTATION_OFFSET));
    let jacobian_velocity = jacobian.fixed_view::<9,3>(0,VELOCITY_OFFSET)*rotation.transpose();
    (jacobian_pose, jacobian_velocity)
}
