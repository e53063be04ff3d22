//! Run and Benchmark Summaries
//!
//! One-line text summaries printed by workers and by the parent.

use crate::FormatError;
use crate::units::{format_number, format_timedeltas};
use steadybench_ipc::{Benchmark, Metadata, RunResult};
use steadybench_stats::{mean, stdev};

/// Summarize samples as `mean +- stdev`
///
/// Verbose mode appends `(min: ..., max: ...)`. The stdev is left out for a
/// single sample. An empty sequence gives `<no sample>`.
pub fn format_run_result(samples: &[f64], verbose: bool) -> Result<String, FormatError> {
    if samples.is_empty() {
        return Ok("<no sample>".to_string());
    }

    let with_stdev = samples.len() >= 2;
    let mut numbers = vec![mean(samples)?];
    if with_stdev {
        numbers.push(stdev(samples)?);
    }
    if verbose {
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        numbers.push(min);
        numbers.push(max);
    }

    let numbers = format_timedeltas(&numbers)?;
    let text = match (verbose, with_stdev) {
        (true, true) => format!(
            "{} +- {} (min: {}, max: {})",
            numbers[0], numbers[1], numbers[2], numbers[3]
        ),
        (true, false) => format!("{} (min: {}, max: {})", numbers[0], numbers[1], numbers[2]),
        (false, true) => format!("{} +- {}", numbers[0], numbers[1]),
        (false, false) => numbers[0].clone(),
    };
    Ok(text)
}

/// Summarize a single run's samples
pub fn format_run(run: &RunResult, verbose: bool) -> Result<String, FormatError> {
    format_run_result(run.samples(), verbose)
}

/// Summarize a whole benchmark
///
/// `name: text (N runs x M samples x L loops; W warmups)`. The run count is
/// shown when there is more than one run and warmups only in verbose mode.
/// A count that differs between runs is left out. A benchmark without runs
/// gives `<no run>`.
pub fn format_benchmark(bench: &Benchmark, verbose: bool) -> Result<String, FormatError> {
    let mut text = if bench.is_empty() {
        "<no run>".to_string()
    } else {
        let mut iterations = Vec::new();
        let nrun = bench.runs().len();
        if nrun > 1 {
            iterations.push(format_number(nrun as u64, "run"));
        }
        if let Some(nsample) = bench.uniform_sample_count().filter(|&n| n > 0) {
            iterations.push(format_number(nsample as u64, "sample"));
        }
        if let Some(loops) = bench.uniform_loops() {
            iterations.push(format_number(loops, "loop"));
        }
        let mut iterations = iterations.join(" x ");
        if verbose {
            if let Some(warmups) = bench.uniform_warmup_count().filter(|&n| n > 0) {
                iterations.push_str(&format!("; {}", format_number(warmups as u64, "warmup")));
            }
        }

        let summary = format_run_result(&bench.samples(), verbose)?;
        if iterations.is_empty() {
            summary
        } else {
            format!("{summary} ({iterations})")
        }
    };

    if let Some(name) = bench.name() {
        text = format!("{name}: {text}");
    }
    Ok(text)
}

/// Metadata as display lines: a `Metadata:` header then `- key: value`
pub fn format_metadata(metadata: &Metadata) -> Vec<String> {
    let mut lines = Vec::with_capacity(metadata.len() + 1);
    lines.push("Metadata:".to_string());
    lines.extend(
        metadata
            .iter()
            .map(|(key, value)| format!("- {key}: {value}")),
    );
    lines
}
