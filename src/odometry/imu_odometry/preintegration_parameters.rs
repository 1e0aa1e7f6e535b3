extern crate nalgebra as na;

use na::{Vector3,Matrix3,Isometry3};
use serde::{Serialize, Deserialize};
use color_eyre::eyre::{ensure, Result, WrapErr};
use std::{fmt,fs,path::Path};

use crate::odometry::imu_odometry::ImuCovariance;
use crate::Float;

const SYMMETRY_EPS: Float = 1e-12;
const EIGENVALUE_EPS: Float = 1e-12;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum PositionIntegration {
    /// p' = p + v*dt
    FirstOrder,
    /// p' = p + v*dt + 0.5*a*dt^2
    SecondOrder
}

/**
 * Compensation for a rotating navigation frame, e.g. earth rate when navigating in ECEF/NED.
 * The vector is the angular rate of the navigation frame expressed in the navigation frame.
 */
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub enum CoriolisCompensation {
    Disabled,
    FirstOrder(Vector3<Float>),
    /// Also includes the centrifugal terms
    SecondOrder(Vector3<Float>)
}

impl CoriolisCompensation {
    pub fn angular_rate(&self) -> Vector3<Float> {
        match self {
            CoriolisCompensation::Disabled => Vector3::<Float>::zeros(),
            CoriolisCompensation::FirstOrder(omega) | CoriolisCompensation::SecondOrder(omega) => *omega
        }
    }

    pub fn is_second_order(&self) -> bool {
        matches!(self, CoriolisCompensation::SecondOrder(_))
    }
}

/**
 * Continuous time noise model, gravity and integration options shared by the
 * preintegration and the factor built from it.
 */
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct PreintegrationParameters {
    pub accelerometer_covariance: Matrix3<Float>,
    pub gyroscope_covariance: Matrix3<Float>,
    /// Covariance of the error made when integrating velocity to position
    pub integration_covariance: Matrix3<Float>,
    /// Gravity in the navigation frame
    pub gravity: Vector3<Float>,
    pub position_integration: PositionIntegration,
    pub coriolis: CoriolisCompensation,
    /// Pose of the imu in the body frame. None if the imu defines the body frame
    pub body_pose_sensor: Option<Isometry3<Float>>
}

impl PreintegrationParameters {

    /**
     * Navigation frame with z pointing down, i.e. gravity = (0,0,g)
     */
    pub fn z_down(g: Float) -> PreintegrationParameters {
        PreintegrationParameters::with_gravity(&Vector3::<Float>::new(0.0,0.0,g))
    }

    /**
     * Navigation frame with z pointing up, i.e. gravity = (0,0,-g)
     */
    pub fn z_up(g: Float) -> PreintegrationParameters {
        PreintegrationParameters::with_gravity(&Vector3::<Float>::new(0.0,0.0,-g))
    }

    pub fn with_gravity(gravity: &Vector3<Float>) -> PreintegrationParameters {
        PreintegrationParameters {
            accelerometer_covariance: Matrix3::<Float>::zeros(),
            gyroscope_covariance: Matrix3::<Float>::zeros(),
            integration_covariance: Matrix3::<Float>::zeros(),
            gravity: *gravity,
            position_integration: PositionIntegration::SecondOrder,
            coriolis: CoriolisCompensation::Disabled,
            body_pose_sensor: None
        }
    }

    /**
     * Covariances from per axis white noise densities (sigma per sqrt(Hz)) as given in imu datasheets.
     */
    pub fn from_noise_densities(accelerometer_noise_density: &Vector3<Float>, gyro_noise_density: &Vector3<Float>, integration_sigma: Float, gravity: &Vector3<Float>) -> PreintegrationParameters {
        PreintegrationParameters {
            accelerometer_covariance: generate_noise_covariance(accelerometer_noise_density),
            gyroscope_covariance: generate_noise_covariance(gyro_noise_density),
            integration_covariance: Matrix3::<Float>::identity()*integration_sigma.powi(2),
            ..PreintegrationParameters::with_gravity(gravity)
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_covariance("accelerometer", &self.accelerometer_covariance)?;
        check_covariance("gyroscope", &self.gyroscope_covariance)?;
        check_covariance("integration", &self.integration_covariance)?;
        ensure!(self.gravity.iter().all(|v| v.is_finite()), "gravity is not finite: {}", self.gravity);
        ensure!(self.coriolis.angular_rate().iter().all(|v| v.is_finite()), "coriolis angular rate is not finite");
        Ok(())
    }

    pub fn use_second_order_integration(&self) -> bool {
        self.position_integration == PositionIntegration::SecondOrder
    }

    /**
     * Block diagonal continuous time covariance in (integration, accelerometer, gyroscope) order
     */
    pub fn measurement_covariance(&self) -> ImuCovariance {
        let mut covariance = ImuCovariance::zeros();
        covariance.fixed_view_mut::<3,3>(0,0).copy_from(&self.integration_covariance);
        covariance.fixed_view_mut::<3,3>(3,3).copy_from(&self.accelerometer_covariance);
        covariance.fixed_view_mut::<3,3>(6,6).copy_from(&self.gyroscope_covariance);
        covariance
    }

    pub fn from_yaml_str(yaml: &str) -> Result<PreintegrationParameters> {
        let parameters: PreintegrationParameters = serde_yaml::from_str(yaml).wrap_err("could not parse preintegration parameters")?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<PreintegrationParameters> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).wrap_err_with(|| format!("could not read {}", path.display()))?;
        PreintegrationParameters::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).wrap_err("could not serialize preintegration parameters")
    }
}

impl fmt::Display for PreintegrationParameters {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut display = String::from(format!("acc_{:+e}_gyro_{:+e}_int_{:+e}_g_{:+e}_{:+e}_{:+e}",
            self.accelerometer_covariance.trace(), self.gyroscope_covariance.trace(), self.integration_covariance.trace(),
            self.gravity[0], self.gravity[1], self.gravity[2]));
        if self.use_second_order_integration() {
            display.push_str("_p2");
        }
        match self.coriolis {
            CoriolisCompensation::Disabled => (),
            CoriolisCompensation::FirstOrder(w) => display.push_str(format!("_cor_{:+e}",w.norm()).as_str()),
            CoriolisCompensation::SecondOrder(w) => display.push_str(format!("_cor2_{:+e}",w.norm()).as_str())
        };
        if self.body_pose_sensor.is_some() {
            display.push_str("_body_sensor");
        }
        write!(f, "{}", display)
    }
}

fn generate_noise_covariance(noise_density: &Vector3<Float>) -> Matrix3<Float> {
    Matrix3::<Float>::from_diagonal(&noise_density.component_mul(noise_density))
}

/**
 * A covariance has to be finite, symmetric and positive semi-definite
 */
pub fn check_covariance(name: &str, covariance: &Matrix3<Float>) -> Result<()> {
    ensure!(covariance.iter().all(|v| v.is_finite()), "{} covariance is not finite", name);
    let scale = covariance.amax().max(1.0);
    ensure!((covariance - covariance.transpose()).amax() <= SYMMETRY_EPS*scale, "{} covariance is not symmetric: {}", name, covariance);
    let min_eigenvalue = covariance.symmetric_eigen().eigenvalues.min();
    ensure!(min_eigenvalue >= -EIGENVALUE_EPS*scale, "{} covariance is not positive semi-definite, smallest eigenvalue: {}", name, min_eigenvalue);
    Ok(())
}
