// End-to-end estimation runs
//
// Single-sensor run: ground truth + synthetic noise -> filter -> 5-column rows.
// Fusion run: two sensor files -> merge -> filter -> 4-column rows scored
// against a ground-truth file.

use rand::Rng;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::merge::{merge_streams, MergePolicy, Sample};
use crate::noise;
use crate::output::EstimateRow;
use crate::tracker::{track_merged, track_single, SensorVariances, TrackerSettings};

/// Synthetic noise parameters for the single-sensor run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSettings {
    pub mean: f64,
    pub std_dev: f64,
}

/// Corrupt the ground truth with normal noise and filter the result
///
/// # Arguments
/// * `truth` - Ground-truth positions
/// * `noise` - Distribution of the injected noise
/// * `variance` - Measurement variance given to the filter
/// * `settings` - Filter parameters
/// * `rng` - Noise source
///
/// # Returns
/// One row per ground-truth sample, with the noisy measurement filled in
pub fn single_sensor_rows<R: Rng + ?Sized>(
    truth: &[Sample],
    noise: NoiseSettings,
    variance: f64,
    settings: TrackerSettings,
    rng: &mut R,
) -> Result<Vec<EstimateRow>> {
    let errors = noise::generate(noise.mean, noise.std_dev, truth.len(), rng)?;
    let noisy: Vec<Sample> = truth
        .iter()
        .zip(&errors)
        .map(|(s, e)| Sample::new(s.timestamp, s.value + e))
        .collect();

    let estimates = track_single(&noisy, variance, settings)?;

    Ok(truth
        .iter()
        .zip(&noisy)
        .zip(&estimates)
        .map(|((gt, meas), &estimate)| EstimateRow {
            timestamp: gt.timestamp,
            ground_truth: gt.value,
            noisy: Some(meas.value),
            estimate,
        })
        .collect())
}

/// Merge two sensor streams, filter them, and score against ground truth
///
/// The ground truth is linearly interpolated at each merged timestamp.
///
/// # Returns
/// One row per merged sample
pub fn fusion_rows(
    sensor1: &[Sample],
    sensor2: &[Sample],
    truth: &[Sample],
    policy: MergePolicy,
    variances: SensorVariances,
    settings: TrackerSettings,
) -> Result<Vec<EstimateRow>> {
    if truth.is_empty() {
        return Err(Error::InvalidParameter("ground truth is empty".to_string()));
    }

    let merged = merge_streams(sensor1, sensor2, policy);
    let dropped = sensor1.len() + sensor2.len() - merged.len();
    if dropped > 0 {
        warn!(dropped, "Merge stopped at the end of the shorter stream");
    }

    let estimates = track_merged(&merged, variances, settings)?;

    merged
        .iter()
        .zip(&estimates)
        .map(|(sample, &estimate)| {
            let ground_truth = interpolate(truth, sample.timestamp)
                .ok_or_else(|| Error::InvalidParameter("ground truth is empty".to_string()))?;
            Ok(EstimateRow {
                timestamp: sample.timestamp,
                ground_truth,
                noisy: None,
                estimate,
            })
        })
        .collect()
}

/// Linear interpolation of an ordered series at `t`, clamped at both ends
pub fn interpolate(series: &[Sample], t: f64) -> Option<f64> {
    let first = series.first()?;
    let last = series.last()?;
    if t <= first.timestamp {
        return Some(first.value);
    }
    if t >= last.timestamp {
        return Some(last.value);
    }

    let idx = series.partition_point(|s| s.timestamp <= t);
    let (a, b) = (series[idx - 1], series[idx]);
    let frac = (t - a.timestamp) / (b.timestamp - a.timestamp);
    Some(a.value + frac * (b.value - a.value))
}

/// Root-mean-square of the row errors
pub fn rmse(rows: &[EstimateRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let sum: f64 = rows.iter().map(|r| r.error().powi(2)).sum();
    Some((sum / rows.len() as f64).sqrt())
}

/// Log a short summary of a finished run
pub fn log_summary(name: &str, rows: &[EstimateRow]) {
    match rmse(rows) {
        Some(err) => info!("{}: {} rows, RMS position error {:.4}", name, rows.len(), err),
        None => warn!("{}: no rows produced", name),
    }
}
