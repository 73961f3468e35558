
pub mod error;
pub mod constants;
pub mod kalman;
pub mod merge;
pub mod noise;
pub mod input;
pub mod output;
pub mod tracker;
pub mod pipeline;
pub mod config;

pub use error::{Error, Result};
