pub mod lie;
pub mod pose;
pub mod numerical_derivative;
