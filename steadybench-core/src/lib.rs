#![warn(missing_docs)]
//! Steadybench Core - Worker Runtime
//!
//! Everything a worker process needs to produce one run:
//! - [`Clock`] chosen once at startup
//! - Loop count calibration over powers of ten
//! - The warmup/measurement sampling loop
//! - CPU pinning to isolated or explicitly listed CPUs

pub mod affinity;
mod calibrate;
mod error;
mod measure;
mod sampler;
mod worker;

pub use affinity::{
    AffinityManager, AffinityRequest, AffinitySetter, CpuSet, PinOutcome, format_cpu_list,
    parse_cpu_list,
};
pub use calibrate::{
    Calibration, CalibrationConfig, MAX_CALIBRATION_POWER, MIN_TIME_FACTOR, Probe, calibrate,
};
pub use error::BenchError;
pub use measure::Clock;
pub use sampler::{Phase, SampleEvent, SamplingPlan, run_sampling, time_function};
pub use worker::{WorkerConfig, WorkerMain};
