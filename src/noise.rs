// Synthetic measurement noise
//
// Draws independent normal samples from a caller-owned generator so runs can
// be reproduced from a seed.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};

/// Generate `count` independent draws from N(mean, std_dev^2)
///
/// # Arguments
/// * `mean` - Mean of the normal distribution
/// * `std_dev` - Standard deviation (must be finite and non-negative)
/// * `count` - Number of draws
/// * `rng` - Random source, advanced by `count` draws
pub fn generate<R: Rng + ?Sized>(mean: f64, std_dev: f64, count: usize, rng: &mut R) -> Result<Vec<f64>> {
    if !mean.is_finite() {
        return Err(Error::InvalidParameter(format!("noise mean must be finite, got {}", mean)));
    }
    if std_dev.is_infinite() {
        return Err(Error::InvalidParameter(format!(
            "noise standard deviation must be finite, got {}",
            std_dev
        )));
    }
    let normal = Normal::new(mean, std_dev).map_err(|e| {
        Error::InvalidParameter(format!("noise standard deviation {}: {}", std_dev, e))
    })?;

    Ok(normal.sample_iter(rng).take(count).collect())
}
