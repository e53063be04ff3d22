#![warn(missing_docs)]
//! Steadybench Report - Human-Readable Output
//!
//! Text the harness prints while it runs:
//! - Durations with an automatic unit (`1.50 ms`, `123 ns`)
//! - Counts with plurals and powers of ten (`10^6 loops`)
//! - Run and benchmark summaries (`mean +- stdev (...)`)
//! - Metadata listings

mod text;
mod units;

pub use text::{format_benchmark, format_metadata, format_run, format_run_result};
pub use units::{format_number, format_timedelta, format_timedeltas};

use steadybench_stats::StatsError;
use thiserror::Error;

/// Errors raised while formatting
#[derive(Debug, Error)]
pub enum FormatError {
    /// Durations can't be negative
    #[error("durations must be >= 0, got {0}")]
    NegativeDuration(f64),

    /// Computing the summary statistics failed
    #[error(transparent)]
    Stats(#[from] StatsError),
}
