// Linear Kalman filter
//
// Discrete-time predict/update recursion over fixed (num_states,
// num_measurements) dimensions. Every setter and step validates shapes
// before touching stored state, so a failed call leaves the filter as it was.

use nalgebra as na;
use na::{DMatrix, DVector};

use crate::error::{Error, Result, Shape};

/// Linear Kalman filter with fixed state and measurement dimensions
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    num_states: usize,
    num_measurements: usize,

    h: DMatrix<f64>,         // Observation model (m x n)
    q: DMatrix<f64>,         // Process noise covariance (n x n)
    identity: DMatrix<f64>,  // n x n, used by the covariance correction

    x_predicted: Option<DVector<f64>>,
    p_predicted: Option<DMatrix<f64>>,
    x_estimated: Option<DVector<f64>>,
    p_estimated: Option<DMatrix<f64>>,
    gain: Option<DMatrix<f64>>,

    // True between a predict and the update that consumes it
    prediction_pending: bool,
}

impl KalmanFilter {
    /// Create a filter for `num_states` hidden variables observed through
    /// `num_measurements` independent measurements.
    ///
    /// `H` and `Q` start as zero matrices; the state must be seeded with
    /// [`KalmanFilter::set_initial_state`] before the first predict.
    pub fn new(num_states: usize, num_measurements: usize) -> Self {
        Self {
            num_states,
            num_measurements,
            h: DMatrix::zeros(num_measurements, num_states),
            q: DMatrix::zeros(num_states, num_states),
            identity: DMatrix::identity(num_states, num_states),
            x_predicted: None,
            p_predicted: None,
            x_estimated: None,
            p_estimated: None,
            gain: None,
            prediction_pending: false,
        }
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_measurements(&self) -> usize {
        self.num_measurements
    }

    /// Replace the observation matrix `H` (must be m x n)
    pub fn set_observation_matrix(&mut self, h: DMatrix<f64>) -> Result<()> {
        check_matrix("observation matrix", &h, self.num_measurements, self.num_states)?;
        self.h = h;
        Ok(())
    }

    /// Seed the estimated state and covariance
    ///
    /// Discards any prediction that has not been consumed by an update.
    ///
    /// # Arguments
    /// * `x0` - Initial state vector (length n)
    /// * `p0` - Initial state covariance (n x n)
    pub fn set_initial_state(&mut self, x0: DVector<f64>, p0: DMatrix<f64>) -> Result<()> {
        check_vector("initial state", &x0, self.num_states)?;
        check_matrix("initial covariance", &p0, self.num_states, self.num_states)?;

        self.x_estimated = Some(x0);
        self.p_estimated = Some(p0);
        self.x_predicted = None;
        self.p_predicted = None;
        self.prediction_pending = false;
        Ok(())
    }

    /// Replace the process noise covariance `Q` (must be n x n)
    pub fn set_noise_covariance(&mut self, q: DMatrix<f64>) -> Result<()> {
        check_matrix("noise covariance", &q, self.num_states, self.num_states)?;
        self.q = q;
        Ok(())
    }

    /// Propagate the current estimate through the process model
    ///
    /// x_pred = A * x_est + B * u
    /// P_pred = A * P_est * A^T + Q
    ///
    /// # Arguments
    /// * `a` - State transition matrix (n x n)
    /// * `b` - Control input matrix (n x p)
    /// * `u` - Control vector (length p)
    pub fn predict(&mut self, a: &DMatrix<f64>, b: &DMatrix<f64>, u: &DVector<f64>) -> Result<()> {
        check_matrix("state transition matrix", a, self.num_states, self.num_states)?;
        if b.nrows() != self.num_states {
            return Err(Error::Dimension {
                name: "control input matrix",
                expected: Shape(self.num_states, b.ncols()),
                actual: Shape(b.nrows(), b.ncols()),
            });
        }
        check_vector("control vector", u, b.ncols())?;

        let (x, p) = match (&self.x_estimated, &self.p_estimated) {
            (Some(x), Some(p)) => (x, p),
            _ => return Err(Error::Precondition("predict called before the state was initialized")),
        };

        let x_pred = a * x + b * u;
        let p_pred = a * p * a.transpose() + &self.q;

        self.x_predicted = Some(x_pred);
        self.p_predicted = Some(p_pred);
        self.prediction_pending = true;
        Ok(())
    }

    /// Correct the prediction with a measurement
    ///
    /// S = H * P_pred * H^T + R
    /// K = P_pred * H^T * S^-1
    /// x_est = x_pred + K * (y - H * x_pred)
    /// P_est = (I - K * H) * P_pred
    ///
    /// The covariance update is the short form, which can drift slightly away
    /// from symmetry over long runs.
    ///
    /// # Arguments
    /// * `y` - Measurement vector (length m)
    /// * `r` - Observation noise covariance for this measurement (m x m)
    pub fn update(&mut self, y: &DVector<f64>, r: &DMatrix<f64>) -> Result<()> {
        check_vector("measurement vector", y, self.num_measurements)?;
        check_matrix("observation noise covariance", r, self.num_measurements, self.num_measurements)?;

        if !self.prediction_pending {
            return Err(Error::Precondition("update called without a fresh prediction"));
        }
        let (x_pred, p_pred) = match (&self.x_predicted, &self.p_predicted) {
            (Some(x), Some(p)) => (x, p),
            _ => return Err(Error::Precondition("update called without a fresh prediction")),
        };

        let pht = p_pred * self.h.transpose();
        let s = &self.h * &pht + r;
        let gain = solve_gain(&s, &pht)?;

        let innovation = y - &self.h * x_pred;
        let x_est = x_pred + &gain * innovation;
        let p_est = (&self.identity - &gain * &self.h) * p_pred;

        self.x_estimated = Some(x_est);
        self.p_estimated = Some(p_est);
        self.gain = Some(gain);
        self.prediction_pending = false;
        Ok(())
    }

    /// Posterior state after the latest update (or the seeded state)
    pub fn state_estimate(&self) -> Result<&DVector<f64>> {
        self.x_estimated
            .as_ref()
            .ok_or(Error::Precondition("no state estimate available"))
    }

    /// Prior state from the latest predict
    pub fn state_predicted(&self) -> Result<&DVector<f64>> {
        self.x_predicted
            .as_ref()
            .ok_or(Error::Precondition("no predicted state available"))
    }

    pub fn covariance_estimate(&self) -> Result<&DMatrix<f64>> {
        self.p_estimated
            .as_ref()
            .ok_or(Error::Precondition("no covariance estimate available"))
    }

    pub fn covariance_predicted(&self) -> Result<&DMatrix<f64>> {
        self.p_predicted
            .as_ref()
            .ok_or(Error::Precondition("no predicted covariance available"))
    }

    /// Gain computed by the latest update
    pub fn kalman_gain(&self) -> Result<&DMatrix<f64>> {
        self.gain
            .as_ref()
            .ok_or(Error::Precondition("no update has run yet"))
    }

    pub fn observation_matrix(&self) -> &DMatrix<f64> {
        &self.h
    }

    pub fn noise_covariance(&self) -> &DMatrix<f64> {
        &self.q
    }
}

/// Compute K = PH^T * S^-1 without forming the inverse
///
/// Solves S^T * K^T = (PH^T)^T. Cholesky is used when S is symmetric
/// positive definite, LU otherwise.
fn solve_gain(s: &DMatrix<f64>, pht: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let s_t = s.transpose();
    let rhs = pht.transpose();

    let solved = if is_symmetric(s) {
        s_t.clone().cholesky().map(|chol| chol.solve(&rhs))
    } else {
        None
    };
    let solved = match solved {
        Some(k_t) => Some(k_t),
        None => s_t.lu().solve(&rhs),
    };

    match solved {
        Some(k_t) if k_t.iter().all(|v| v.is_finite()) => Ok(k_t.transpose()),
        _ => Err(Error::SingularMatrix { name: "innovation covariance" }),
    }
}

fn is_symmetric(m: &DMatrix<f64>) -> bool {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (m[(i, j)], m[(j, i)]);
            if (a - b).abs() > 1e-12 * a.abs().max(b.abs()).max(1.0) {
                return false;
            }
        }
    }
    true
}

fn check_matrix(name: &'static str, m: &DMatrix<f64>, rows: usize, cols: usize) -> Result<()> {
    if m.nrows() != rows || m.ncols() != cols {
        return Err(Error::Dimension {
            name,
            expected: Shape(rows, cols),
            actual: Shape(m.nrows(), m.ncols()),
        });
    }
    Ok(())
}

fn check_vector(name: &'static str, v: &DVector<f64>, len: usize) -> Result<()> {
    if v.len() != len {
        return Err(Error::Dimension {
            name,
            expected: Shape(len, 1),
            actual: Shape(v.len(), 1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    fn scalar_filter(q: f64, x0: f64, p0: f64) -> KalmanFilter {
        let mut kf = KalmanFilter::new(1, 1);
        kf.set_observation_matrix(scalar(1.0)).unwrap();
        kf.set_noise_covariance(scalar(q)).unwrap();
        kf.set_initial_state(DVector::from_element(1, x0), scalar(p0)).unwrap();
        kf
    }

    fn scalar_step(kf: &mut KalmanFilter, y: f64, r: f64) -> f64 {
        kf.predict(&scalar(1.0), &scalar(0.0), &DVector::zeros(1)).unwrap();
        kf.update(&DVector::from_element(1, y), &scalar(r)).unwrap();
        kf.state_estimate().unwrap()[0]
    }

    fn constant_velocity_filter() -> KalmanFilter {
        let mut kf = KalmanFilter::new(2, 1);
        kf.set_observation_matrix(DMatrix::from_row_slice(1, 2, &[1.0, 0.0])).unwrap();
        kf.set_noise_covariance(DMatrix::from_diagonal_element(2, 2, 0.01)).unwrap();
        kf.set_initial_state(
            DVector::from_vec(vec![1.0, 2.0]),
            DMatrix::from_row_slice(2, 2, &[
                1.0, 0.5,
                0.5, 2.0,
            ]),
        ).unwrap();
        kf
    }

    #[test]
    fn test_new_filter_defaults() {
        let kf = KalmanFilter::new(3, 2);
        assert_eq!(kf.num_states(), 3);
        assert_eq!(kf.num_measurements(), 2);
        assert_eq!(kf.observation_matrix(), &DMatrix::zeros(2, 3));
        assert_eq!(kf.noise_covariance(), &DMatrix::zeros(3, 3));
        assert!(matches!(kf.state_estimate(), Err(Error::Precondition(_))));
        assert!(matches!(kf.state_predicted(), Err(Error::Precondition(_))));
        assert!(matches!(kf.kalman_gain(), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_setters_reject_wrong_shapes() {
        let mut kf = KalmanFilter::new(2, 1);

        let err = kf.set_observation_matrix(DMatrix::identity(2, 2)).unwrap_err();
        match err {
            Error::Dimension { expected, actual, .. } => {
                assert_eq!(expected, Shape(1, 2));
                assert_eq!(actual, Shape(2, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(kf.observation_matrix(), &DMatrix::zeros(1, 2));

        assert!(matches!(
            kf.set_noise_covariance(DMatrix::identity(3, 3)),
            Err(Error::Dimension { .. })
        ));
        assert!(matches!(
            kf.set_initial_state(DVector::zeros(3), DMatrix::identity(2, 2)),
            Err(Error::Dimension { .. })
        ));
        assert!(matches!(
            kf.set_initial_state(DVector::zeros(2), DMatrix::identity(2, 3)),
            Err(Error::Dimension { .. })
        ));
        assert!(kf.state_estimate().is_err());
    }

    #[test]
    fn test_predict_before_initial_state() {
        let mut kf = KalmanFilter::new(1, 1);
        let err = kf.predict(&scalar(1.0), &scalar(0.0), &DVector::zeros(1)).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_predict_identity_transition() {
        let mut kf = constant_velocity_filter();
        kf.predict(&DMatrix::identity(2, 2), &DMatrix::zeros(2, 1), &DVector::zeros(1)).unwrap();

        let x = kf.state_predicted().unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);

        // P_pred = P + Q
        let p = kf.covariance_predicted().unwrap();
        assert!((p[(0, 0)] - 1.01).abs() < 1e-12);
        assert!((p[(0, 1)] - 0.5).abs() < 1e-12);
        assert!((p[(1, 1)] - 2.01).abs() < 1e-12);
    }

    #[test]
    fn test_predict_with_control_input() {
        let mut kf = constant_velocity_filter();
        let a = DMatrix::from_row_slice(2, 2, &[
            1.0, 1.0,
            0.0, 1.0,
        ]);
        let b = DMatrix::from_row_slice(2, 1, &[0.5, 1.0]);
        let u = DVector::from_element(1, 2.0);

        kf.predict(&a, &b, &u).unwrap();

        // A*x = [3, 2], B*u = [1, 2]
        let x = kf.state_predicted().unwrap();
        assert!((x[0] - 4.0).abs() < 1e-12);
        assert!((x[1] - 4.0).abs() < 1e-12);

        let p0 = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 2.0]);
        let expected = &a * p0 * a.transpose() + DMatrix::from_diagonal_element(2, 2, 0.01);
        let p = kf.covariance_predicted().unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((p[(i, j)] - expected[(i, j)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_predict_with_multiple_controls() {
        let mut kf = constant_velocity_filter();
        let b = DMatrix::from_row_slice(2, 3, &[
            1.0, 0.0, 1.0,
            0.0, 1.0, 1.0,
        ]);
        let u = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        kf.predict(&DMatrix::identity(2, 2), &b, &u).unwrap();

        let x = kf.state_predicted().unwrap();
        assert!((x[0] - 5.0).abs() < 1e-12);
        assert!((x[1] - 7.0).abs() < 1e-12);

        let err = kf
            .predict(&DMatrix::identity(2, 2), &b, &DVector::zeros(2))
            .unwrap_err();
        assert!(matches!(err, Error::Dimension { name: "control vector", .. }));
    }

    #[test]
    fn test_update_without_prediction() {
        let mut kf = scalar_filter(0.01, 0.0, 1.0);
        let err = kf.update(&DVector::from_element(1, 1.0), &scalar(0.1)).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));

        // A second update on the same prediction is also rejected
        scalar_step(&mut kf, 1.0, 0.1);
        let err = kf.update(&DVector::from_element(1, 1.0), &scalar(0.1)).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_scalar_step_matches_closed_form() {
        let mut kf = scalar_filter(0.01, 0.0, 1.0);
        kf.predict(&scalar(1.0), &scalar(0.0), &DVector::zeros(1)).unwrap();
        assert!((kf.state_predicted().unwrap()[0]).abs() < 1e-12);

        kf.update(&DVector::from_element(1, 1.0), &scalar(0.1)).unwrap();

        let p_pred = 1.01;
        let k = p_pred / (p_pred + 0.1);
        let x = kf.state_estimate().unwrap()[0];
        assert!(x > 0.0 && x < 1.0);
        assert!((x - k).abs() < 1e-12);
        assert!((kf.kalman_gain().unwrap()[(0, 0)] - k).abs() < 1e-12);
        assert!((kf.covariance_estimate().unwrap()[(0, 0)] - (1.0 - k) * p_pred).abs() < 1e-12);
    }

    #[test]
    fn test_smaller_measurement_noise_trusts_measurement_more() {
        let mut loose = scalar_filter(0.01, 0.0, 1.0);
        let mut tight = scalar_filter(0.01, 0.0, 1.0);
        let x_loose = scalar_step(&mut loose, 1.0, 0.1);
        let x_tight = scalar_step(&mut tight, 1.0, 0.001);
        assert!(x_tight > x_loose);
        assert!(x_tight < 1.0);
    }

    #[test]
    fn test_measurement_noise_limits() {
        // R -> 0: estimate follows the measurement
        let mut kf = scalar_filter(0.01, 0.0, 1.0);
        let x = scalar_step(&mut kf, 3.0, 1e-12);
        assert!((x - 3.0).abs() < 1e-9);

        // R -> inf: estimate stays at the prediction
        let mut kf = scalar_filter(0.01, 0.5, 1.0);
        let x = scalar_step(&mut kf, 3.0, 1e12);
        let x_pred = kf.state_predicted().unwrap()[0];
        assert!((x - x_pred).abs() < 1e-9);
    }

    #[test]
    fn test_two_measurement_update_matches_direct_inverse() {
        let mut kf = KalmanFilter::new(2, 2);
        kf.set_observation_matrix(DMatrix::from_row_slice(2, 2, &[
            1.0, 0.0,
            1.0, 1.0,
        ])).unwrap();
        kf.set_noise_covariance(DMatrix::from_diagonal_element(2, 2, 0.05)).unwrap();
        kf.set_initial_state(
            DVector::from_vec(vec![0.5, -1.0]),
            DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]),
        ).unwrap();

        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.0, 1.0]);
        kf.predict(&a, &DMatrix::zeros(2, 1), &DVector::zeros(1)).unwrap();

        let y = DVector::from_vec(vec![0.7, -0.2]);
        let r = DMatrix::from_row_slice(2, 2, &[0.2, 0.05, 0.05, 0.3]);

        let h = kf.observation_matrix().clone();
        let x_pred = kf.state_predicted().unwrap().clone();
        let p_pred = kf.covariance_predicted().unwrap().clone();
        let s = &h * &p_pred * h.transpose() + &r;
        let k = &p_pred * h.transpose() * s.try_inverse().unwrap();
        let expected_x = &x_pred + &k * (&y - &h * &x_pred);
        let expected_p = (DMatrix::identity(2, 2) - &k * &h) * &p_pred;

        kf.update(&y, &r).unwrap();

        let x = kf.state_estimate().unwrap();
        let p = kf.covariance_estimate().unwrap();
        for i in 0..2 {
            assert!((x[i] - expected_x[i]).abs() < 1e-10);
            for j in 0..2 {
                assert!((p[(i, j)] - expected_p[(i, j)]).abs() < 1e-10);
            }
        }

        // Well-posed update keeps the covariance symmetric
        assert!((p[(0, 1)] - p[(1, 0)]).abs() < 1e-10);
    }

    #[test]
    fn test_singular_innovation_covariance() {
        let mut kf = scalar_filter(0.0, 1.0, 0.0);
        kf.predict(&scalar(1.0), &scalar(0.0), &DVector::zeros(1)).unwrap();

        let err = kf.update(&DVector::from_element(1, 2.0), &scalar(0.0)).unwrap_err();
        assert!(matches!(err, Error::SingularMatrix { .. }));

        // Nothing changed: the prediction can still be consumed
        assert!((kf.state_estimate().unwrap()[0] - 1.0).abs() < 1e-12);
        kf.update(&DVector::from_element(1, 2.0), &scalar(1.0)).unwrap();
    }

    #[test]
    fn test_dimension_failure_leaves_state_unchanged() {
        let mut kf = constant_velocity_filter();
        kf.predict(&DMatrix::identity(2, 2), &DMatrix::zeros(2, 1), &DVector::zeros(1)).unwrap();
        kf.update(&DVector::from_element(1, 1.5), &scalar(0.1)).unwrap();
        kf.predict(&DMatrix::identity(2, 2), &DMatrix::zeros(2, 1), &DVector::zeros(1)).unwrap();

        let before = kf.clone();

        assert!(kf.predict(&DMatrix::identity(3, 3), &DMatrix::zeros(2, 1), &DVector::zeros(1)).is_err());
        assert!(kf.predict(&DMatrix::identity(2, 2), &DMatrix::zeros(3, 1), &DVector::zeros(1)).is_err());
        assert!(kf.update(&DVector::zeros(2), &scalar(0.1)).is_err());
        assert!(kf.update(&DVector::zeros(1), &DMatrix::identity(2, 2)).is_err());
        assert!(kf.set_initial_state(DVector::zeros(1), DMatrix::identity(1, 1)).is_err());
        assert!(kf.set_noise_covariance(DMatrix::identity(1, 1)).is_err());
        assert!(kf.set_observation_matrix(DMatrix::identity(2, 2)).is_err());

        assert_eq!(kf.state_estimate().unwrap(), before.state_estimate().unwrap());
        assert_eq!(kf.covariance_estimate().unwrap(), before.covariance_estimate().unwrap());
        assert_eq!(kf.state_predicted().unwrap(), before.state_predicted().unwrap());
        assert_eq!(kf.covariance_predicted().unwrap(), before.covariance_predicted().unwrap());
        assert_eq!(kf.kalman_gain().unwrap(), before.kalman_gain().unwrap());
        assert_eq!(kf.observation_matrix(), before.observation_matrix());
        assert_eq!(kf.noise_covariance(), before.noise_covariance());

        // The pending prediction survived the failed calls
        kf.update(&DVector::from_element(1, 1.5), &scalar(0.1)).unwrap();
    }

    #[test]
    fn test_converges_on_constant_signal() {
        let mut kf = scalar_filter(0.001, 0.0, 1.0);
        let measurements = [5.1, 4.9, 5.2, 4.8, 5.0, 5.05, 4.95, 5.0];

        let mut estimate = 0.0;
        for &y in &measurements {
            estimate = scalar_step(&mut kf, y, 0.1);
        }
        assert!((estimate - 5.0).abs() < 0.3);
        assert!(kf.covariance_estimate().unwrap()[(0, 0)] < 0.1);
    }
}
