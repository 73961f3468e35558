// Kalman filter module
// Linear estimation engine and the motion models that feed it

pub mod filter;
pub mod model;

pub use filter::KalmanFilter;
pub use model::MotionModel;
