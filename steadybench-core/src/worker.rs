//! Worker Process Entry Point
//!
//! The worker side of a session: resolve the loop count (calibrating when it
//! is 0), then take one full sampling pass into a fresh [`RunResult`]. CPU
//! pinning happens before this, see [`crate::AffinityManager`].

use crate::calibrate::{CalibrationConfig, calibrate};
use crate::error::BenchError;
use crate::sampler::{SampleEvent, SamplingPlan, run_sampling};
use steadybench_ipc::RunResult;
use steadybench_ipc::metadata::{Metadata, keys};
use tracing::{debug, info};

/// Settings of one worker run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerConfig {
    /// Executions per sample, 0 to calibrate
    pub loops: u64,
    /// Warmup observations
    pub warmups: usize,
    /// Measured observations
    pub samples: usize,
    /// Divisor for sample functions with their own inner loop
    pub inner_loops: Option<u64>,
    /// Calibration window, used when `loops` is 0
    pub calibration: CalibrationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            loops: 0,
            warmups: 1,
            samples: 3,
            inner_loops: None,
            calibration: CalibrationConfig::default(),
        }
    }
}

/// Runs one measurement pass of a sample function
pub struct WorkerMain<F> {
    sample_fn: F,
}

impl<F> WorkerMain<F>
where
    F: FnMut(u64) -> f64,
{
    /// Wrap a sample function returning the total seconds of `loops` executions
    pub fn new(sample_fn: F) -> Self {
        Self { sample_fn }
    }

    /// Return `requested`, or calibrate a loop count when it is 0
    pub fn resolve_loops(
        &mut self,
        requested: u64,
        calibration: &CalibrationConfig,
    ) -> Result<u64, BenchError> {
        if requested > 0 {
            return Ok(requested);
        }
        let result = calibrate(&mut self.sample_fn, calibration)?;
        info!(loops = result.loops, probes = result.probes.len(), "calibrated");
        Ok(result.loops)
    }

    /// Calibrate if needed, then sample
    ///
    /// `metadata` is attached to the run, completed with the `loops` and
    /// `inner_loops` keys unless the caller already set them.
    pub fn run<C>(
        &mut self,
        config: &WorkerConfig,
        metadata: Metadata,
        on_sample: C,
    ) -> Result<RunResult, BenchError>
    where
        C: FnMut(SampleEvent),
    {
        if config.inner_loops == Some(0) {
            return Err(BenchError::config("inner_loops must be >= 1"));
        }
        let loops = self.resolve_loops(config.loops, &config.calibration)?;
        let plan = SamplingPlan {
            loops,
            warmups: config.warmups,
            samples: config.samples,
            inner_loops: config.inner_loops,
        };

        let mut run = RunResult::new(Some(loops))?
            .with_inner_loops(config.inner_loops)?
            .with_metadata(metadata);
        run.metadata_mut()
            .insert_missing(keys::LOOPS, loops.to_string())?;
        if let Some(inner_loops) = config.inner_loops {
            run.metadata_mut()
                .insert_missing(keys::INNER_LOOPS, inner_loops.to_string())?;
        }

        debug!(loops, warmups = plan.warmups, samples = plan.samples, "sampling");
        run_sampling(&mut self.sample_fn, &plan, &mut run, on_sample)?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_loops_skip_calibration() {
        let mut probes = 0;
        let mut worker = WorkerMain::new(|_| {
            probes += 1;
            0.0
        });
        let loops = worker
            .resolve_loops(42, &CalibrationConfig::default())
            .unwrap();
        assert_eq!(loops, 42);
        drop(worker);
        assert_eq!(probes, 0);
    }

    #[test]
    fn test_zero_loops_calibrates() {
        let mut worker = WorkerMain::new(|loops| loops as f64 * 0.001);
        let loops = worker
            .resolve_loops(0, &CalibrationConfig::default())
            .unwrap();
        assert_eq!(loops, 100);
    }

    #[test]
    fn test_run_fills_result() {
        let mut worker = WorkerMain::new(|loops| loops as f64 * 0.001);
        let config = WorkerConfig {
            warmups: 2,
            samples: 3,
            ..WorkerConfig::default()
        };
        let mut metadata = Metadata::new();
        metadata.insert("hostname", "bench01").unwrap();

        let mut seen = 0;
        let run = worker.run(&config, metadata, |_| seen += 1).unwrap();

        assert_eq!(seen, 5);
        assert_eq!(run.loops(), Some(100));
        assert_eq!(run.warmups().len(), 2);
        assert_eq!(run.samples().len(), 3);
        for &sample in run.samples() {
            assert!((sample - 0.001).abs() < 1e-12);
        }
        assert_eq!(run.metadata().get("hostname"), Some("bench01"));
        assert_eq!(run.metadata().get(keys::LOOPS), Some("100"));
        assert_eq!(run.metadata().get(keys::INNER_LOOPS), None);
    }

    #[test]
    fn test_run_records_inner_loops() {
        let mut worker = WorkerMain::new(|_| 1.0);
        let config = WorkerConfig {
            loops: 10,
            warmups: 0,
            samples: 1,
            inner_loops: Some(5),
            ..WorkerConfig::default()
        };
        let run = worker.run(&config, Metadata::new(), |_| {}).unwrap();
        assert_eq!(run.inner_loops(), Some(5));
        assert_eq!(run.samples(), &[1.0 / 50.0]);
        assert_eq!(run.metadata().get(keys::INNER_LOOPS), Some("5"));
    }

    #[test]
    fn test_invalid_calibration_window() {
        let mut worker = WorkerMain::new(|_| 1.0);
        let config = WorkerConfig {
            calibration: CalibrationConfig {
                min_time: 2.0,
                max_time: 1.0,
            },
            ..WorkerConfig::default()
        };
        assert!(matches!(
            worker.run(&config, Metadata::new(), |_| {}),
            Err(BenchError::InvalidConfiguration(_))
        ));
    }
}
