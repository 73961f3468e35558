use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::constants::*;
use crate::kalman::MotionModel;
use crate::merge::MergePolicy;
use crate::tracker::TrackerSettings;

/// Kalman filter position tracking
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add synthetic noise to a ground-truth track and filter it.
    /// Writes timestamp,ground_truth,noisy,estimated,error rows.
    Single(SingleArgs),

    /// Merge two sensor files and filter the combined stream.
    /// Writes timestamp,ground_truth,estimated,error rows.
    Fuse(FuseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SingleArgs {
    /// Ground-truth file (timestamp,position per line)
    #[arg(long, value_name = "FILE")]
    pub truth: PathBuf,

    /// Output file
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Mean of the injected measurement noise
    #[arg(long, default_value_t = DEFAULT_NOISE_MEAN, allow_negative_numbers = true)]
    pub noise_mean: f64,

    /// Standard deviation of the injected measurement noise
    #[arg(long, default_value_t = DEFAULT_NOISE_STD)]
    pub noise_std: f64,

    /// Seed for the noise generator (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Measurement variance given to the filter
    #[arg(long, default_value_t = DEFAULT_MEASUREMENT_VARIANCE)]
    pub measurement_variance: f64,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FuseArgs {
    /// Sensor 1 file (timestamp,position per line)
    #[arg(long, value_name = "FILE")]
    pub sensor1: PathBuf,

    /// Sensor 2 file (timestamp,position per line)
    #[arg(long, value_name = "FILE")]
    pub sensor2: PathBuf,

    /// Ground-truth file, interpolated at each merged timestamp
    #[arg(long, value_name = "FILE")]
    pub truth: PathBuf,

    /// Output file
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Sensor 1 measurement variance
    #[arg(long, default_value_t = DEFAULT_SENSOR1_VARIANCE)]
    pub sensor1_variance: f64,

    /// Sensor 2 measurement variance
    #[arg(long, default_value_t = DEFAULT_SENSOR2_VARIANCE)]
    pub sensor2_variance: f64,

    /// Stop merging when either sensor file ends instead of flushing the other
    #[arg(long, default_value_t = false)]
    pub truncate: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl FuseArgs {
    pub fn merge_policy(&self) -> MergePolicy {
        if self.truncate {
            MergePolicy::Truncate
        } else {
            MergePolicy::Flush
        }
    }
}

/// Options shared by both runs
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Process model
    #[arg(long, value_enum, default_value_t = MotionModel::Velocity)]
    pub model: MotionModel,

    /// Process noise intensity
    #[arg(long, default_value_t = DEFAULT_PROCESS_NOISE)]
    pub process_noise: f64,

    /// Initial position estimate
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub initial_position: f64,

    /// Initial variance of each state component
    #[arg(long, default_value_t = DEFAULT_INITIAL_VARIANCE)]
    pub initial_variance: f64,

    /// Known constant acceleration applied as control input
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub acceleration: f64,
}

impl FilterArgs {
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            model: self.model,
            process_noise: self.process_noise,
            initial_position: self.initial_position,
            initial_variance: self.initial_variance,
            acceleration: self.acceleration,
        }
    }
}
