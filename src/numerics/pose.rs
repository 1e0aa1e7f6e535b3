extern crate nalgebra as na;

use na::{Vector,Vector3,Matrix3,UnitQuaternion,Isometry3,Translation3,Rotation3,Const,storage::Storage};
use crate::numerics::lie::exp_r;
use crate::Float;

pub fn from_parts(t: &Vector3<Float>, rotation: &Matrix3<Float>) -> Isometry3<Float> {
    let quat = UnitQuaternion::<Float>::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation));
    Isometry3::<Float>::from_parts(Translation3::from(*t), quat)
}

pub fn decomp(pose:&Isometry3<Float>) -> (Vector3<Float>,Matrix3<Float>) {
    (pose.translation.vector,pose.rotation.to_rotation_matrix().matrix().into_owned())
}

/**
 * Body frame perturbation of a pose with tangent (dp, dθ): R' = R*Exp(dθ), p' = p + R*dp
 */
pub fn retract<S>(pose: &Isometry3<Float>, xi: &Vector<Float,Const<6>,S>) -> Isometry3<Float> where S: Storage<Float,Const<6>,Const<1>> {
    let (t, rotation) = decomp(pose);
    let new_rotation = rotation*exp_r(&xi.fixed_rows::<3>(3));
    let new_t = t + rotation*xi.fixed_rows::<3>(0);
    from_parts(&new_t, &new_rotation)
}
