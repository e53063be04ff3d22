//! Steadybench Example Benchmark
//!
//! Sums a vector of integers. The parent process spawns this same binary as
//! worker processes with `--raw`.
//!
//! Run with:
//!   cargo run --release --example bench_sum                    # 25 worker processes
//!   cargo run --release --example bench_sum -- -p 5 -v         # fewer processes, more output
//!   cargo run --release --example bench_sum -- --json-file sum.json
//!   cargo run --release --example bench_sum -- --help          # Show all options

use steadybench::prelude::*;

fn main() -> anyhow::Result<()> {
    let data: Vec<u64> = (0..10_000).collect();

    let mut runner = Runner::new().with_name("sum");
    runner.metadata_mut().insert("length", data.len().to_string())?;
    runner.bench_func(|| data.iter().sum::<u64>())?;
    Ok(())
}
