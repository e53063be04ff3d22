#![warn(missing_docs)]
//! # Steadybench
//!
//! Micro-benchmark harness that spreads measurements over many processes.
//!
//! - **Calibration**: the loop count grows until one sample lasts long enough
//!   to be measured reliably
//! - **Process Isolation**: every run comes from a fresh worker process so one
//!   lucky or unlucky process can't skew the result
//! - **CPU Pinning**: workers run on the kernel's isolated CPUs when there
//!   are any, or on an explicit `--affinity` list
//! - **JSON Results**: workers report over a versioned JSON document that the
//!   parent aggregates into a results document
//!
//! ## Quick Start
//!
//! ```ignore
//! use steadybench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let data: Vec<u64> = (0..1000).collect();
//!     Runner::new()
//!         .with_name("sum")
//!         .bench_func(|| data.iter().sum::<u64>())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Timing
//!
//! A sample function receives the loop count and returns the total elapsed
//! seconds, which lets it exclude setup from the measurement:
//!
//! ```ignore
//! Runner::new().bench_sample_func(|loops| {
//!     let clock = Clock::detect();
//!     let start = clock.now();
//!     for _ in 0..loops {
//!         std::hint::black_box(work());
//!     }
//!     clock.elapsed_since(start).as_secs_f64()
//! })?;
//! ```

// Re-export the driver
pub use steadybench_cli::{
    Cli, RunSettings, Runner, RunnerDefaults, SteadyConfig, Supervisor, SupervisorError,
    WorkerArgs, WorkerFailure, WorkerSpec, load_benchmark, load_run_result,
};

// Re-export core types
pub use steadybench_core::{
    AffinityManager, AffinityRequest, AffinitySetter, BenchError, CalibrationConfig, Clock,
    CpuSet, PinOutcome, SampleEvent, SamplingPlan, WorkerConfig, WorkerMain, calibrate,
    format_cpu_list, parse_cpu_list, run_sampling, time_function,
};

// Re-export the data model
pub use steadybench_ipc::metadata::keys as metadata_keys;
pub use steadybench_ipc::{Benchmark, DocumentError, Metadata, ModelError, RunResult};

// Re-export formatting and stats
pub use steadybench_report::{
    FormatError, format_benchmark, format_metadata, format_number, format_run,
    format_run_result, format_timedelta, format_timedeltas,
};
pub use steadybench_stats::{StatsError, Summary, mean, stdev, summarize};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Benchmark, Clock, Metadata, RunResult, Runner, RunnerDefaults};
}
