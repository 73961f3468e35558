// Position tracking
//
// Drives a Kalman filter over a time-ordered measurement stream: one predict
// (over the time elapsed since the previous sample) and one update per sample.

use nalgebra as na;
use na::{DMatrix, DVector};
use tracing::debug;

use crate::constants;
use crate::error::{Error, Result};
use crate::kalman::{KalmanFilter, MotionModel};
use crate::merge::{MergedSample, Origin, Sample};

/// Filter parameters shared by every run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    pub model: MotionModel,
    /// Process noise intensity (spectral density)
    pub process_noise: f64,
    /// Position the filter starts from
    pub initial_position: f64,
    /// Variance of every initial state component
    pub initial_variance: f64,
    /// Known acceleration applied as control input on every step
    pub acceleration: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            model: MotionModel::Velocity,
            process_noise: constants::DEFAULT_PROCESS_NOISE,
            initial_position: 0.0,
            initial_variance: constants::DEFAULT_INITIAL_VARIANCE,
            acceleration: 0.0,
        }
    }
}

impl TrackerSettings {
    fn validate(&self) -> Result<()> {
        check_variance("process noise", self.process_noise)?;
        check_variance("initial variance", self.initial_variance)?;
        if !self.initial_position.is_finite() || !self.acceleration.is_finite() {
            return Err(Error::InvalidParameter(
                "initial position and acceleration must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Measurement variance of each sensor in a fusion run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorVariances {
    pub sensor1: f64,
    pub sensor2: f64,
}

/// Kalman filter tracking the position of one object
#[derive(Debug, Clone)]
pub struct PositionTracker {
    filter: KalmanFilter,
    settings: TrackerSettings,
    last_time: Option<f64>,
    steps: usize,
}

impl PositionTracker {
    pub fn new(settings: TrackerSettings) -> Result<Self> {
        settings.validate()?;

        let model = settings.model;
        let mut filter = KalmanFilter::new(model.num_states(), 1);
        filter.set_observation_matrix(model.observation())?;
        filter.set_initial_state(
            model.initial_state(settings.initial_position),
            model.initial_covariance(settings.initial_variance),
        )?;

        Ok(Self {
            filter,
            settings,
            last_time: None,
            steps: 0,
        })
    }

    /// Predict to `timestamp` and correct with `measurement`
    ///
    /// The first sample is predicted with a zero time step.
    ///
    /// # Returns
    /// Estimated position after the update
    pub fn step(&mut self, timestamp: f64, measurement: f64, variance: f64) -> Result<f64> {
        check_variance("measurement variance", variance)?;
        let dt = match self.last_time {
            Some(last) if timestamp < last => {
                return Err(Error::InvalidParameter(format!(
                    "sample at {} is earlier than previous sample at {}",
                    timestamp, last
                )));
            }
            Some(last) => timestamp - last,
            None => 0.0,
        };

        let model = self.settings.model;
        let u = DVector::from_element(1, self.settings.acceleration);
        self.filter.set_noise_covariance(model.process_noise(self.settings.process_noise, dt))?;
        self.filter.predict(&model.transition(dt), &model.control(dt), &u)?;
        self.filter.update(
            &DVector::from_element(1, measurement),
            &DMatrix::from_element(1, 1, variance),
        )?;

        self.last_time = Some(timestamp);
        self.steps += 1;

        let position = self.position()?;
        debug!(timestamp, measurement, dt, position, "Filter step");
        Ok(position)
    }

    /// Current position estimate
    pub fn position(&self) -> Result<f64> {
        Ok(self.filter.state_estimate()?[0])
    }

    /// Current velocity estimate (constant-velocity model only)
    pub fn velocity(&self) -> Option<f64> {
        match self.settings.model {
            MotionModel::Velocity => self.filter.state_estimate().ok().map(|x| x[1]),
            MotionModel::Position => None,
        }
    }

    /// Standard deviation of the position estimate
    pub fn position_error(&self) -> Result<f64> {
        let p = self.filter.covariance_estimate()?[(0, 0)];
        Ok(if p < 0.0 { 0.0 } else { p.sqrt() })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn filter(&self) -> &KalmanFilter {
        &self.filter
    }
}

/// Run the tracker over one sensor's samples
///
/// # Returns
/// Position estimate for each sample, index-aligned with `samples`
pub fn track_single(samples: &[Sample], variance: f64, settings: TrackerSettings) -> Result<Vec<f64>> {
    let mut tracker = PositionTracker::new(settings)?;
    samples
        .iter()
        .map(|s| tracker.step(s.timestamp, s.value, variance))
        .collect()
}

/// Run the tracker over a merged two-sensor stream
///
/// Each sample is corrected with its own sensor's variance. In a coincident
/// pair the first sample is sensor 1's and the second sensor 2's.
///
/// # Returns
/// Position estimate for each sample, index-aligned with `samples`
pub fn track_merged(
    samples: &[MergedSample],
    variances: SensorVariances,
    settings: TrackerSettings,
) -> Result<Vec<f64>> {
    let mut tracker = PositionTracker::new(settings)?;
    let mut estimates = Vec::with_capacity(samples.len());
    let mut pair_started = false;

    for sample in samples {
        let variance = match sample.origin {
            Origin::Sensor1 => variances.sensor1,
            Origin::Sensor2 => variances.sensor2,
            Origin::Both => {
                pair_started = !pair_started;
                if pair_started { variances.sensor1 } else { variances.sensor2 }
            }
        };
        estimates.push(tracker.step(sample.timestamp, sample.value, variance)?);
    }

    Ok(estimates)
}

fn check_variance(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}
