pub mod numerics;
pub mod odometry;
pub mod sensors;

macro_rules! define_float {
    ($f:tt) => {
        pub use std::$f as float;
        pub type Float = $f;
    }
}

define_float!(f64);
