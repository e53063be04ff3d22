#![warn(missing_docs)]
//! Steadybench Result Model
//!
//! Data exchanged between a worker process and the parent that spawned it:
//! - [`RunResult`]: one process's warmups, samples, loop count and metadata
//! - [`Benchmark`]: the ordered runs of a session plus aggregate metadata
//! - Versioned JSON documents (`{"run_result": {...}}` / `{"results": {...}}`)

mod document;
mod messages;
pub mod metadata;

pub use document::DocumentError;
pub use messages::{Benchmark, ModelError, Results, RunResult};
pub use metadata::Metadata;

/// Version written into, and required from, every serialized document
pub const FORMAT_VERSION: u64 = 1;

/// Top-level key of a single-run document
pub const RUN_RESULT_KEY: &str = "run_result";

/// Top-level key of a multi-run document
pub const RESULTS_KEY: &str = "results";
