// Default filter and simulation parameters

/// Process noise intensity used when none is given
pub const DEFAULT_PROCESS_NOISE: f64 = 0.01;

/// Variance of each initial state component
pub const DEFAULT_INITIAL_VARIANCE: f64 = 1.0;

/// Measurement variance for single-sensor runs
pub const DEFAULT_MEASUREMENT_VARIANCE: f64 = 0.1;

/// Sensor 1 (camera) measurement variance for fusion runs
pub const DEFAULT_SENSOR1_VARIANCE: f64 = 0.05;

/// Sensor 2 (radar) measurement variance for fusion runs
pub const DEFAULT_SENSOR2_VARIANCE: f64 = 0.2;

/// Mean of the synthetic measurement noise
pub const DEFAULT_NOISE_MEAN: f64 = 0.0;

/// Standard deviation of the synthetic measurement noise
pub const DEFAULT_NOISE_STD: f64 = 0.3;
