extern crate nalgebra as na;

use na::{SMatrix,SVector};
use crate::Float;

pub const DEFAULT_DELTA: Float = 1e-5;

/**
 * Central difference jacobian of f at x, where x is perturbed through retract(x, dx).
 * For vector spaces retract is plain addition, for manifolds it is the chart the
 * analytic jacobians are expressed in.
 */
pub fn numerical_derivative_retract<X, F, R, const N: usize, const M: usize>(f: F, x: &X, retract: R, delta: Float) -> SMatrix<Float,M,N>
    where F: Fn(&X) -> SVector<Float,M>, R: Fn(&X, &SVector<Float,N>) -> X {
    let mut jacobian = SMatrix::<Float,M,N>::zeros();
    let factor = 1.0/(2.0*delta);
    for j in 0..N {
        let mut dx = SVector::<Float,N>::zeros();
        dx[j] = delta;
        let f_plus = f(&retract(x,&dx));
        let f_minus = f(&retract(x,&(-dx)));
        jacobian.set_column(j, &((f_plus - f_minus)*factor));
    }
    jacobian
}

pub fn numerical_derivative<F, const N: usize, const M: usize>(f: F, x: &SVector<Float,N>, delta: Float) -> SMatrix<Float,M,N>
    where F: Fn(&SVector<Float,N>) -> SVector<Float,M> {
    numerical_derivative_retract(f, x, |v: &SVector<Float,N>, dx: &SVector<Float,N>| v + dx, delta)
}
