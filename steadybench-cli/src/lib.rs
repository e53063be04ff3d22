#![warn(missing_docs)]
//! Steadybench CLI Library
//!
//! Command-line handling for benchmark programs. A benchmark program hands
//! its function to a [`Runner`]; the runner parses the flags below, spawns
//! worker processes running the same program with `--raw`, and prints the
//! aggregated result.
//!
//! # Example
//!
//! ```ignore
//! use steadybench_cli::Runner;
//!
//! fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_name("sum")
//!         .bench_func(|| (0..1000u64).sum::<u64>())?;
//!     Ok(())
//! }
//! ```

mod config;
mod metadata;
mod runner;
mod supervisor;

pub use config::*;
pub use metadata::collect_metadata;
pub use runner::{Runner, load_benchmark, load_run_result};
pub use supervisor::*;

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Command-line flags of a benchmark program
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Run a benchmark in multiple worker processes")]
pub struct Cli {
    /// Number of worker processes
    #[arg(short = 'p', long)]
    pub processes: Option<usize>,

    /// Number of measured samples per process
    #[arg(short = 'n', long)]
    pub samples: Option<usize>,

    /// Number of warmup samples per process
    #[arg(short = 'w', long)]
    pub warmups: Option<usize>,

    /// Loops per sample, 0 to calibrate
    #[arg(short = 'l', long)]
    pub loops: Option<u64>,

    /// Verbose mode, repeat for more output
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Write the result document to stdout, human output goes to stderr
    #[arg(long)]
    pub json: bool,

    /// Write the result document to this file
    #[arg(long)]
    pub json_file: Option<PathBuf>,

    /// Minimum duration of one sample in seconds, used by calibration
    #[arg(long)]
    pub min_time: Option<f64>,

    /// Maximum duration of one sample in seconds, used by calibration
    #[arg(long)]
    pub max_time: Option<f64>,

    /// Run a single worker in this process
    #[arg(long)]
    pub raw: bool,

    /// Show metadata
    #[arg(short, long)]
    pub metadata: bool,

    /// CPU list to pin processes to, e.g. `0-3,6`
    #[arg(long)]
    pub affinity: Option<String>,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// Install the stderr log subscriber for the given `-v` count
///
/// `RUST_LOG` overrides the level. Only the first call in a process installs
/// anything.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "steadybench=warn",
        1 => "steadybench=info",
        _ => "steadybench=debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
