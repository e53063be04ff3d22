//! Summary Statistics
//!
//! Mean and standard deviation are undefined for too-short inputs; rather than
//! returning 0.0 the functions here report [`StatsError::InvalidInput`] so the
//! caller decides how to degrade.

use thiserror::Error;

/// Errors produced by the statistics helpers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Not enough data points for the requested statistic
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Arithmetic mean of `samples`.
pub fn mean(samples: &[f64]) -> Result<f64, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::InvalidInput("mean requires at least one data point"));
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample standard deviation (divides by n - 1).
///
/// Uses the corrected two-pass algorithm: the second sum removes the rounding
/// error left in the first pass's mean, so samples with a large mean and a tiny
/// spread do not cancel catastrophically.
pub fn stdev(samples: &[f64]) -> Result<f64, StatsError> {
    let n = samples.len();
    if n < 2 {
        return Err(StatsError::InvalidInput(
            "stdev requires at least two data points",
        ));
    }

    let c = mean(samples)?;
    let (squares, deviations) = samples.iter().fold((0.0, 0.0), |(sq, dev), &x| {
        let d = x - c;
        (sq + d * d, dev + d)
    });
    let ss = squares - deviations * deviations / n as f64;
    // ss can dip a hair below zero for constant inputs
    let variance = (ss / (n - 1) as f64).max(0.0);

    Ok(variance.sqrt())
}

/// Descriptive statistics of one sample sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Number of samples
    pub count: usize,
    /// Arithmetic mean (`None` when empty)
    pub mean: Option<f64>,
    /// Sample standard deviation (`None` with fewer than two samples)
    pub stdev: Option<f64>,
    /// Smallest sample
    pub min: Option<f64>,
    /// Largest sample
    pub max: Option<f64>,
}

/// Compute every statistic that is defined for `samples`.
pub fn summarize(samples: &[f64]) -> Summary {
    let min = samples
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let max = samples
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Summary {
        count: samples.len(),
        mean: mean(samples).ok(),
        stdev: stdev(samples).ok(),
        min,
        max,
    }
}

impl Summary {
    /// Coefficient of variation in percent (relative stdev)
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        match (self.mean, self.stdev) {
            (Some(mean), Some(stdev)) if mean != 0.0 => Some(stdev / mean * 100.0),
            _ => None,
        }
    }
}
