//! Loop Count Calibration
//!
//! Exponential search over `loops = 10^k` for a loop count whose sample
//! duration lands in `[0.9 * min_time, max_time]`. At most
//! `MAX_CALIBRATION_POWER + 1` probes are made.

use crate::error::BenchError;
use tracing::debug;

/// Largest power of ten tried
pub const MAX_CALIBRATION_POWER: u32 = 9;

/// A probe is accepted once it reaches this fraction of `min_time`
pub const MIN_TIME_FACTOR: f64 = 0.9;

/// Target duration window of a single sample, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationConfig {
    /// Minimum duration of one sample
    pub min_time: f64,
    /// Maximum duration of one sample
    pub max_time: f64,
}

impl CalibrationConfig {
    /// Build a validated window
    pub fn new(min_time: f64, max_time: f64) -> Result<Self, BenchError> {
        let config = Self { min_time, max_time };
        config.validate()?;
        Ok(config)
    }

    /// Check `0 < min_time < max_time`
    pub fn validate(&self) -> Result<(), BenchError> {
        if !(self.min_time.is_finite() && self.min_time > 0.0) {
            return Err(BenchError::config(format!(
                "min_time must be > 0 seconds, got {}",
                self.min_time
            )));
        }
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return Err(BenchError::config(format!(
                "max_time must be > 0 seconds, got {}",
                self.max_time
            )));
        }
        if self.min_time >= self.max_time {
            return Err(BenchError::config(format!(
                "min_time ({}) must be < max_time ({})",
                self.min_time, self.max_time
            )));
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_time: 0.1,
            max_time: 1.0,
        }
    }
}

/// One calibration measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    /// Loop count tried
    pub loops: u64,
    /// Elapsed seconds reported by the measure function
    pub elapsed: f64,
}

/// Outcome of a calibration
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Selected loop count, always >= 1
    pub loops: u64,
    /// Probes in the order they were made
    pub probes: Vec<Probe>,
}

/// Find a loop count for `measure`, which runs `loops` iterations and
/// returns the total elapsed seconds.
///
/// When a probe reaches `max_time` the search steps back one power of ten
/// (never below 1) without re-measuring, so the chosen count may fall short
/// of `min_time`. Shorter samples are preferred over overlong ones.
pub fn calibrate<F>(mut measure: F, config: &CalibrationConfig) -> Result<Calibration, BenchError>
where
    F: FnMut(u64) -> f64,
{
    config.validate()?;

    let min_dt = config.min_time * MIN_TIME_FACTOR;
    let max_dt = config.max_time;
    let mut probes = Vec::with_capacity(MAX_CALIBRATION_POWER as usize + 1);
    let mut loops = 1;

    for power in 0..=MAX_CALIBRATION_POWER {
        loops = 10u64.pow(power);
        let elapsed = measure(loops);
        debug!(loops, elapsed, "calibration probe");
        probes.push(Probe { loops, elapsed });

        if elapsed >= max_dt {
            loops = 10u64.pow(power.saturating_sub(1));
            break;
        }
        if elapsed >= min_dt {
            break;
        }
    }

    debug!(loops, probes = probes.len(), "calibration done");
    Ok(Calibration { loops, probes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> CalibrationConfig {
        CalibrationConfig::new(0.1, 1.0).unwrap()
    }

    #[test]
    fn test_linear_workload() {
        let result = calibrate(|loops| loops as f64 * 0.001, &window()).unwrap();
        assert_eq!(result.loops, 100);
        assert_eq!(result.probes.len(), 3);
    }

    #[test]
    fn test_exact_lower_boundary_is_accepted() {
        let config = window();
        let threshold = config.min_time * MIN_TIME_FACTOR;
        let result = calibrate(
            |loops| if loops >= 1000 { threshold } else { 0.0 },
            &config,
        )
        .unwrap();
        assert_eq!(result.loops, 1000);
    }

    #[test]
    fn test_just_below_boundary_continues() {
        let config = window();
        let below = config.min_time * MIN_TIME_FACTOR * 0.999;
        let result = calibrate(
            |loops| if loops == 1000 { below } else { loops as f64 * 2e-4 },
            &config,
        )
        .unwrap();
        // 1000 loops falls short, 10^4 loops takes 2s which exceeds max_time
        assert_eq!(result.probes.len(), 5);
        assert_eq!(result.loops, 1000);
    }

    #[test]
    fn test_too_slow_steps_back() {
        // 1 loop is too short, 10 loops already take 2s
        let result = calibrate(
            |loops| if loops == 1 { 0.05 } else { loops as f64 * 0.2 },
            &window(),
        )
        .unwrap();
        assert_eq!(result.probes.len(), 2);
        assert_eq!(result.loops, 1);
    }

    #[test]
    fn test_step_back_never_below_one() {
        let result = calibrate(|_| 5.0, &window()).unwrap();
        assert_eq!(result.probes.len(), 1);
        assert_eq!(result.loops, 1);
    }

    #[test]
    fn test_exhausted_search_keeps_last_loops() {
        let result = calibrate(|_| 0.0, &window()).unwrap();
        assert_eq!(result.probes.len(), 10);
        assert_eq!(result.loops, 1_000_000_000);
    }

    #[test]
    fn test_terminates_for_monotonic_measures() {
        let measures: Vec<Box<dyn Fn(u64) -> f64>> = vec![
            Box::new(|l| l as f64 * 1e-9),
            Box::new(|l| l as f64 * 1e-6),
            Box::new(|l| (l as f64).ln_1p() * 0.01),
            Box::new(|l| l as f64 * 10.0),
            Box::new(|l| (l as f64).sqrt() * 1e-3),
        ];
        for measure in measures {
            let mut calls = 0;
            let result = calibrate(
                |loops| {
                    calls += 1;
                    measure(loops)
                },
                &window(),
            )
            .unwrap();
            assert!(calls <= 10);
            assert!(result.loops >= 1);
        }
    }

    #[test]
    fn test_probes_are_powers_of_ten() {
        let result = calibrate(|loops| loops as f64 * 1e-5, &window()).unwrap();
        let loops: Vec<u64> = result.probes.iter().map(|p| p.loops).collect();
        assert_eq!(loops, vec![1, 10, 100, 1000, 10_000]);
        assert_eq!(result.loops, 10_000);
    }

    #[test]
    fn test_invalid_window() {
        assert!(matches!(
            CalibrationConfig::new(0.0, 1.0),
            Err(BenchError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            CalibrationConfig::new(1.0, 0.5),
            Err(BenchError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            CalibrationConfig::new(0.1, f64::NAN),
            Err(BenchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_window_probes_nothing() {
        let config = CalibrationConfig {
            min_time: -1.0,
            max_time: 1.0,
        };
        let mut calls = 0;
        let result = calibrate(
            |_| {
                calls += 1;
                0.0
            },
            &config,
        );
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }
}
