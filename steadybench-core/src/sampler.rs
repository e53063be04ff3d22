//! Sampling Loop
//!
//! Runs the warmup pass and then the measurement pass of one worker. Each
//! observation is normalized to seconds per logical iteration, recorded into
//! the [`RunResult`] and reported to the caller as soon as it exists.

use crate::error::BenchError;
use crate::measure::Clock;
use std::hint::black_box;
use steadybench_ipc::RunResult;

/// Which pass an observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Discarded from statistics
    Warmup,
    /// Measured
    Measurement,
}

/// One normalized observation, reported as it is produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleEvent {
    /// Pass this observation belongs to
    pub phase: Phase,
    /// 1-based position within its pass
    pub index: usize,
    /// Seconds per logical iteration
    pub value: f64,
}

/// How many observations to take and how to normalize them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    /// Executions per observation, must be >= 1
    pub loops: u64,
    /// Warmup observations
    pub warmups: usize,
    /// Measured observations
    pub samples: usize,
    /// Extra divisor for sample functions that run their own inner loop
    pub inner_loops: Option<u64>,
}

impl SamplingPlan {
    /// Reject plans that can't produce meaningful samples
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.loops < 1 {
            return Err(BenchError::config("loops must be >= 1"));
        }
        if self.inner_loops == Some(0) {
            return Err(BenchError::config("inner_loops must be >= 1"));
        }
        Ok(())
    }

    fn divisor(&self) -> f64 {
        self.loops as f64 * self.inner_loops.unwrap_or(1) as f64
    }
}

/// Run the warmup pass then the measurement pass
///
/// `sample_fn(loops)` must return the total elapsed seconds of `loops`
/// executions. Observations land in `run` in call order and each one is
/// passed to `on_sample` right after it is recorded. An invalid plan fails
/// before `sample_fn` is ever called.
pub fn run_sampling<F, C>(
    mut sample_fn: F,
    plan: &SamplingPlan,
    run: &mut RunResult,
    mut on_sample: C,
) -> Result<(), BenchError>
where
    F: FnMut(u64) -> f64,
    C: FnMut(SampleEvent),
{
    plan.validate()?;
    let divisor = plan.divisor();

    for index in 1..=plan.warmups {
        let value = sample_fn(plan.loops) / divisor;
        run.push_warmup(value)?;
        on_sample(SampleEvent {
            phase: Phase::Warmup,
            index,
            value,
        });
    }

    for index in 1..=plan.samples {
        let value = sample_fn(plan.loops) / divisor;
        run.push_sample(value)?;
        on_sample(SampleEvent {
            phase: Phase::Measurement,
            index,
            value,
        });
    }

    Ok(())
}

/// Turn a plain closure into a sample function timed with `clock`
///
/// The closure runs `loops` times per call and each result goes through
/// [`black_box`] so the work can't be optimized away.
pub fn time_function<T, F>(clock: Clock, mut f: F) -> impl FnMut(u64) -> f64
where
    F: FnMut() -> T,
{
    move |loops| {
        let start = clock.now();
        for _ in 0..loops {
            black_box(f());
        }
        clock.elapsed_since(start).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(loops: u64, warmups: usize, samples: usize) -> SamplingPlan {
        SamplingPlan {
            loops,
            warmups,
            samples,
            inner_loops: None,
        }
    }

    #[test]
    fn test_warmup_and_sample_counts() {
        let mut calls = 0u32;
        let mut run = RunResult::new(Some(10)).unwrap();
        run_sampling(
            |loops| {
                calls += 1;
                loops as f64 * calls as f64
            },
            &plan(10, 2, 3),
            &mut run,
            |_| {},
        )
        .unwrap();

        // call order is preserved: 1, 2 are warmups, 3..=5 are samples
        assert_eq!(run.warmups(), &[1.0, 2.0]);
        assert_eq!(run.samples(), &[3.0, 4.0, 5.0]);
        assert!(run.samples().iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn test_normalization() {
        let mut run = RunResult::new(Some(100)).unwrap();
        let plan = SamplingPlan {
            loops: 100,
            warmups: 0,
            samples: 1,
            inner_loops: Some(4),
        };
        run_sampling(|_| 2.0, &plan, &mut run, |_| {}).unwrap();
        assert_eq!(run.samples(), &[2.0 / 400.0]);
    }

    #[test]
    fn test_events_are_streamed_in_order() {
        let mut events = Vec::new();
        let mut run = RunResult::new(Some(1)).unwrap();
        run_sampling(|_| 1.0, &plan(1, 1, 2), &mut run, |event| events.push(event)).unwrap();

        let phases: Vec<(Phase, usize)> = events.iter().map(|e| (e.phase, e.index)).collect();
        assert_eq!(
            phases,
            vec![
                (Phase::Warmup, 1),
                (Phase::Measurement, 1),
                (Phase::Measurement, 2),
            ]
        );
    }

    #[test]
    fn test_event_follows_each_call() {
        // every callback sees exactly as many recorded values as calls made
        let calls = std::cell::Cell::new(0usize);
        let mut run = RunResult::new(Some(1)).unwrap();
        run_sampling(
            |_| {
                calls.set(calls.get() + 1);
                0.5
            },
            &plan(1, 2, 2),
            &mut run,
            |event| {
                let seen = match event.phase {
                    Phase::Warmup => event.index,
                    Phase::Measurement => 2 + event.index,
                };
                assert_eq!(seen, calls.get());
            },
        )
        .unwrap();
    }

    #[test]
    fn test_zero_loops_fails_before_timing() {
        let mut calls = 0;
        let mut run = RunResult::new(None).unwrap();
        let err = run_sampling(
            |_| {
                calls += 1;
                1.0
            },
            &plan(0, 1, 1),
            &mut run,
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfiguration(_)));
        assert_eq!(calls, 0);
        assert!(run.samples().is_empty());
    }

    #[test]
    fn test_zero_inner_loops_rejected() {
        let plan = SamplingPlan {
            loops: 1,
            warmups: 0,
            samples: 1,
            inner_loops: Some(0),
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_negative_timing_is_an_error() {
        let mut run = RunResult::new(Some(1)).unwrap();
        let err = run_sampling(|_| -1.0, &plan(1, 0, 1), &mut run, |_| {}).unwrap_err();
        assert!(matches!(err, BenchError::Model(_)));
    }

    #[test]
    fn test_time_function_runs_loops_times() {
        let mut count = 0u64;
        {
            let mut sample = time_function(Clock::detect(), || {
                count += 1;
                count
            });
            let elapsed = sample(25);
            assert!(elapsed >= 0.0);
        }
        assert_eq!(count, 25);
    }
}
