extern crate nalgebra as na;

use na::{Vector,Vector3,Matrix,Matrix3,U3,U1,base::storage::Storage};
use crate::{float,Float};

/// Below this angle the closed form coefficients are replaced by their Taylor expansions
pub const SMALL_ANGLE: Float = 1e-3;
/// Distance to pi below which the rotation axis is recovered from the symmetric part
const NEAR_PI: Float = 1e-3;

pub fn skew_symmetric<T>(w: &Vector<Float,U3,T>) -> Matrix3<Float> where T: Storage<Float,U3,U1>  {
    Matrix3::<Float>::new(0.0, -w[2], w[1],
                          w[2], 0.0, -w[0],
                          -w[1], w[0], 0.0)
}

pub fn vector_from_skew_symmetric<T>(w_x: &Matrix<Float,U3,U3,T>) -> Vector3<Float> where T: Storage<Float,U3,U3> {
    Vector3::<Float>::new(w_x[(2,1)],w_x[(0,2)],w_x[(1,0)])
}

/**
 * Coefficients (sin(θ)/θ, (1-cos(θ))/θ², (θ-sin(θ))/θ³) shared by exp and the right jacobian.
 */
#[allow(non_snake_case)]
fn rodrigues_coefficients(angle: Float) -> (Float,Float,Float) {
    let angle_sqr = angle*angle;
    match angle {
        a if a < SMALL_ANGLE => {
            let angle_quad = angle_sqr*angle_sqr;
            let A = 1.0 - angle_sqr/6.0 + angle_quad/120.0;
            let B = 0.5 - angle_sqr/24.0 + angle_quad/720.0;
            let C = 1.0/6.0 - angle_sqr/120.0 + angle_quad/5040.0;
            (A,B,C)
        },
        _ => {
            let half_sin = (0.5*angle).sin();
            let A = angle.sin()/angle;
            let B = 2.0*half_sin*half_sin/angle_sqr;
            let C = (angle - angle.sin())/(angle_sqr*angle);
            (A,B,C)
        }
    }
}

#[allow(non_snake_case)]
pub fn exp_r<T>(w: &Vector<Float,U3,T>) -> Matrix3<Float> where T: Storage<Float,U3,U1> {
    let (A,B,_) = rodrigues_coefficients(w.norm());
    let w_x = skew_symmetric(w);
    let I = Matrix3::<Float>::identity();
    I + A*w_x + B*w_x*w_x
}

/**
 * Rotation vector of R. Stays well defined at the identity and close to a half turn.
 */
#[allow(non_snake_case)]
pub fn ln_r<T>(R: &Matrix<Float,U3,U3,T>) -> Vector3<Float> where T: Storage<Float,U3,U3> {
    let cos_angle = (0.5*(R.trace() - 1.0)).max(-1.0).min(1.0);
    let sin_axis = 0.5*Vector3::<Float>::new(R[(2,1)] - R[(1,2)], R[(0,2)] - R[(2,0)], R[(1,0)] - R[(0,1)]);
    let sin_angle = sin_axis.norm();
    let angle = sin_angle.atan2(cos_angle);

    match angle {
        a if a < SMALL_ANGLE => {
            let angle_sqr = angle*angle;
            (1.0 + angle_sqr/6.0 + 7.0*angle_sqr*angle_sqr/360.0)*sin_axis
        },
        a if float::consts::PI - a < NEAR_PI => {
            // (R + R^T)/2 = cos(θ) I + (1 - cos(θ)) a a^T
            let symmetric = 0.5*(R + R.transpose()) - cos_angle*Matrix3::<Float>::identity();
            let outer = symmetric/(1.0 - cos_angle);
            let diagonal = outer.diagonal();
            let k = diagonal.imax();
            let axis_k = diagonal[k].max(0.0).sqrt();
            let mut axis = outer.column(k)/axis_k;
            axis.normalize_mut();
            if axis.dot(&sin_axis) < 0.0 {
                axis = -axis;
            }
            angle*axis
        },
        _ => (angle/sin_angle)*sin_axis
    }
}

/**
 * Right jacobian of the exponential map: Exp(w + dw) ≈ Exp(w)*Exp(Jr(w)*dw)
 */
#[allow(non_snake_case)]
pub fn right_jacobian<T>(w: &Vector<Float,U3,T>) -> Matrix3<Float> where T: Storage<Float,U3,U1> {
    let (_,B,C) = rodrigues_coefficients(w.norm());
    let w_x = skew_symmetric(w);
    let I = Matrix3::<Float>::identity();
    I - B*w_x + C*w_x*w_x
}

#[allow(non_snake_case)]
pub fn right_inverse_jacobian<T>(w: &Vector<Float,U3,T>) -> Matrix3<Float> where T: Storage<Float,U3,U1> {
    let w_x = skew_symmetric(w);
    let w_norm = w.norm();
    let w_norm_sqrd = w_norm*w_norm;

    let D = match w_norm {
        n if n < SMALL_ANGLE => 1.0/12.0 + w_norm_sqrd/720.0 + w_norm_sqrd*w_norm_sqrd/30240.0,
        _ => 1.0/w_norm_sqrd - (1.0 + w_norm.cos())/(2.0*w_norm*w_norm.sin())
    };

    let I = Matrix3::<Float>::identity();
    I + 0.5*w_x + D*w_x*w_x
}
