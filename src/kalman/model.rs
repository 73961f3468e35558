// Motion models for one-dimensional position tracking
//
// Builds the per-step matrices the filter needs from the elapsed time
// between samples. Only position is ever observed.

use nalgebra as na;
use na::{DMatrix, DVector};

/// Process model driving the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MotionModel {
    /// State is [position]; position is a random walk
    Position,
    /// State is [position, velocity]; velocity is a random walk
    Velocity,
}

impl MotionModel {
    pub fn num_states(&self) -> usize {
        match self {
            MotionModel::Position => 1,
            MotionModel::Velocity => 2,
        }
    }

    /// State transition matrix A for a step of `dt` seconds
    ///
    /// x' = x + v*dt
    /// v' = v
    pub fn transition(&self, dt: f64) -> DMatrix<f64> {
        match self {
            MotionModel::Position => DMatrix::identity(1, 1),
            MotionModel::Velocity => DMatrix::from_row_slice(2, 2, &[
                1.0, dt,
                0.0, 1.0,
            ]),
        }
    }

    /// Control input matrix B for a commanded acceleration
    ///
    /// The position model has no velocity state, so acceleration has no effect.
    pub fn control(&self, dt: f64) -> DMatrix<f64> {
        match self {
            MotionModel::Position => DMatrix::zeros(1, 1),
            MotionModel::Velocity => DMatrix::from_row_slice(2, 1, &[0.5 * dt * dt, dt]),
        }
    }

    /// Observation matrix H; only position is measured
    pub fn observation(&self) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(1, self.num_states());
        h[(0, 0)] = 1.0;
        h
    }

    /// Process noise covariance Q for a step of `dt` seconds
    ///
    /// `intensity` is the spectral density of the white noise driving the
    /// last state (position for the random walk, velocity otherwise).
    pub fn process_noise(&self, intensity: f64, dt: f64) -> DMatrix<f64> {
        match self {
            MotionModel::Position => DMatrix::from_element(1, 1, intensity * dt),
            MotionModel::Velocity => {
                let dt2 = dt * dt;
                let dt3 = dt2 * dt;
                DMatrix::from_row_slice(2, 2, &[
                    dt3 / 3.0, dt2 / 2.0,
                    dt2 / 2.0, dt,
                ]) * intensity
            }
        }
    }

    /// Initial state with the given position and zero velocity
    pub fn initial_state(&self, position: f64) -> DVector<f64> {
        let mut x = DVector::zeros(self.num_states());
        x[0] = position;
        x
    }

    /// Diagonal initial covariance
    pub fn initial_covariance(&self, variance: f64) -> DMatrix<f64> {
        DMatrix::from_diagonal_element(self.num_states(), self.num_states(), variance)
    }
}
