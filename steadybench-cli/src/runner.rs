//! Benchmark Runner
//!
//! Drives one benchmark session from a benchmark program's `main`:
//!
//! 1. Resolve settings (CLI > `steadybench.toml` > [`RunnerDefaults`])
//! 2. Pin the process to CPUs
//! 3. Calibrate the loop count when it is 0
//! 4. In `--raw` mode, take one run in this process; otherwise spawn
//!    `processes` workers running this same program in `--raw` mode
//! 5. Print a summary and write the JSON document if asked to
//!
//! Human-readable output goes to stdout, or to stderr when `--json` puts
//! the document on stdout.

use crate::Cli;
use crate::config::{RunSettings, RunnerDefaults, SteadyConfig};
use crate::init_tracing;
use crate::metadata::collect_metadata;
use crate::supervisor::{PrepareArgs, Supervisor, WorkerArgs, WorkerSpec};
use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use steadybench_core::{
    AffinityManager, AffinityRequest, BenchError, Clock, CpuSet, Phase, PinOutcome,
    WorkerConfig, WorkerMain, format_cpu_list, time_function,
};
use steadybench_ipc::{Benchmark, DocumentError, Metadata, RunResult};
use steadybench_report::{
    format_benchmark, format_metadata, format_number, format_run, format_run_result,
};

/// Entry point of a benchmark program
pub struct Runner {
    name: Option<String>,
    defaults: RunnerDefaults,
    metadata: Metadata,
    inner_loops: Option<u64>,
    program: Option<PathBuf>,
    program_args: Vec<OsString>,
    prepare_args: Option<PrepareArgs>,
    cli: Option<Cli>,
    config: Option<SteadyConfig>,
    affinity: AffinityManager,
    display: Option<Box<dyn Write>>,
}

impl Runner {
    /// Runner reading its settings from `std::env::args()`
    pub fn new() -> Self {
        Self {
            name: None,
            defaults: RunnerDefaults::default(),
            metadata: Metadata::new(),
            inner_loops: None,
            program: None,
            program_args: Vec::new(),
            prepare_args: None,
            cli: None,
            config: None,
            affinity: AffinityManager::new(),
            display: None,
        }
    }

    /// Benchmark name shown in the summary and stored in the results
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Defaults used when neither flags nor config file set a value
    pub fn with_defaults(mut self, defaults: RunnerDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Metadata attached to every run; collected host metadata never
    /// replaces these keys
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Divide every sample by `inner_loops`, for sample functions that
    /// repeat the work themselves
    pub fn with_inner_loops(mut self, inner_loops: u64) -> Self {
        self.inner_loops = Some(inner_loops);
        self
    }

    /// Program spawned as worker (defaults to the current executable)
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Arguments placed before the worker flags
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Hook that may append arguments to every worker command line
    pub fn with_prepare_args(mut self, hook: impl Fn(&mut Vec<OsString>) + 'static) -> Self {
        self.prepare_args = Some(Box::new(hook));
        self
    }

    /// Use already-parsed arguments instead of `std::env::args()`
    pub fn with_cli(mut self, cli: Cli) -> Self {
        self.cli = Some(cli);
        self
    }

    /// Use this configuration instead of discovering `steadybench.toml`
    pub fn with_config(mut self, config: SteadyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific affinity manager
    pub fn with_affinity_manager(mut self, manager: AffinityManager) -> Self {
        self.affinity = manager;
        self
    }

    /// Send human-readable output here instead of stdout/stderr
    pub fn with_display(mut self, display: Box<dyn Write>) -> Self {
        self.display = Some(display);
        self
    }

    /// Benchmark `f`, timed by the harness and called `loops` times per sample
    pub fn bench_func<T, F>(self, f: F) -> anyhow::Result<Benchmark>
    where
        F: FnMut() -> T,
    {
        self.bench_sample_func(time_function(Clock::detect(), f))
    }

    /// Benchmark a sample function returning the total elapsed seconds of
    /// `loops` iterations
    pub fn bench_sample_func<F>(mut self, sample_fn: F) -> anyhow::Result<Benchmark>
    where
        F: FnMut(u64) -> f64,
    {
        let cli = match self.cli.take() {
            Some(cli) => cli,
            None => Cli::parse(),
        };
        init_tracing(cli.verbose);

        let config = match self.config.take() {
            Some(config) => config,
            None => SteadyConfig::discover()?.unwrap_or_default(),
        };
        let mut settings = RunSettings::resolve(&cli, &config, &self.defaults)?;
        if self.inner_loops == Some(0) {
            let message = "inner_loops must be >= 1".to_string();
            return Err(BenchError::InvalidConfiguration(message).into());
        }

        let mut out: Box<dyn Write> = match self.display.take() {
            Some(display) => display,
            None if settings.json => Box::new(io::stderr()),
            None => Box::new(io::stdout()),
        };

        let pinned = self.pin_cpus(&settings, &mut out)?;

        let mut worker = WorkerMain::new(sample_fn);
        if settings.loops == 0 {
            settings.loops = worker.resolve_loops(0, &settings.calibration)?;
            if settings.verbose > 1 {
                writeln!(out, "Calibration: use {}", format_number(settings.loops, "loop"))?;
            }
        }

        if settings.raw {
            self.run_worker(&settings, worker, pinned.as_ref(), out)
        } else {
            self.spawn_workers(&settings, pinned.as_ref(), out)
        }
    }

    fn pin_cpus(
        &self,
        settings: &RunSettings,
        out: &mut dyn Write,
    ) -> anyhow::Result<Option<CpuSet>> {
        let request = AffinityRequest::from_option(settings.affinity.as_deref())?;
        let outcome = self.affinity.pin(&request)?;

        match (&request, &outcome) {
            (AffinityRequest::Explicit(_), PinOutcome::Pinned(cpus)) if settings.verbose > 0 => {
                writeln!(out, "Pin process to CPUs: {}", format_cpu_list(cpus))?;
            }
            (AffinityRequest::Auto, PinOutcome::Pinned(cpus)) if settings.verbose > 0 => {
                writeln!(out, "Pin process to isolated CPUs: {}", format_cpu_list(cpus))?;
            }
            (_, PinOutcome::Unavailable(_)) => {
                writeln!(
                    out,
                    "WARNING: unable to pin worker processes to isolated CPUs, CPU affinity not available"
                )?;
            }
            _ => {}
        }
        Ok(outcome.pinned().cloned())
    }

    fn run_worker<F>(
        &self,
        settings: &RunSettings,
        mut worker: WorkerMain<F>,
        pinned: Option<&CpuSet>,
        mut out: Box<dyn Write>,
    ) -> anyhow::Result<Benchmark>
    where
        F: FnMut(u64) -> f64,
    {
        let mut metadata = self.metadata.clone();
        collect_metadata(&mut metadata, pinned)?;

        let config = WorkerConfig {
            loops: settings.loops,
            warmups: settings.warmups,
            samples: settings.samples,
            inner_loops: self.inner_loops,
            calibration: settings.calibration,
        };

        let verbose = settings.verbose > 0;
        let mut display_error: Option<io::Error> = None;
        let run = worker.run(&config, metadata, |event| {
            if !verbose || display_error.is_some() {
                return;
            }
            let label = match event.phase {
                Phase::Warmup => "Warmup",
                Phase::Measurement => "Sample",
            };
            let text = format_run_result(&[event.value], false).unwrap_or_else(|e| e.to_string());
            if let Err(e) = writeln!(out, "{label} {}: {text}", event.index) {
                display_error = Some(e);
            }
        })?;
        if let Some(e) = display_error {
            return Err(e.into());
        }

        if settings.metadata {
            for line in format_metadata(run.metadata()) {
                writeln!(out, "{line}")?;
            }
        }
        writeln!(
            out,
            "Average: {} ({})",
            format_run(&run, verbose)?,
            format_number(run.samples().len() as u64, "sample")
        )?;
        out.flush()?;

        write_documents(settings, &mut io::stdout().lock(), |w| run.write_json(w))?;
        Ok(Benchmark::from_parts(
            self.name.clone(),
            Metadata::new(),
            vec![run],
        ))
    }

    fn spawn_workers(
        &mut self,
        settings: &RunSettings,
        pinned: Option<&CpuSet>,
        mut out: Box<dyn Write>,
    ) -> anyhow::Result<Benchmark> {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().context("cannot locate the benchmark executable")?,
        };
        let args = WorkerArgs {
            samples: settings.samples,
            warmups: settings.warmups,
            loops: settings.loops,
            verbose: settings.verbose,
            affinity: pinned.map(format_cpu_list),
        };
        let mut spec = WorkerSpec::new(program, args).with_program_args(self.program_args.clone());
        if let Some(hook) = self.prepare_args.take() {
            spec = spec.with_prepare_args(hook);
        }
        let supervisor =
            Supervisor::new(spec, settings.processes).forward_stderr(settings.verbose > 0);

        let nprocess = settings.processes;
        let mut display_error: Option<io::Error> = None;
        let mut bench = supervisor.run(self.name.clone(), |index, run| {
            let written = if settings.verbose > 1 {
                let text = format_run(run, true).unwrap_or_else(|e| e.to_string());
                writeln!(out, "Run {index}/{nprocess}: {text}")
            } else {
                write!(out, ".").and_then(|()| out.flush())
            };
            if let Err(e) = written {
                display_error.get_or_insert(e);
            }
        })?;
        if let Some(e) = display_error {
            return Err(e.into());
        }
        if settings.verbose <= 1 {
            writeln!(out)?;
        }

        let mut metadata = self.metadata.clone();
        metadata.merge_missing(&bench.common_metadata());
        *bench.metadata_mut() = metadata;

        if settings.metadata {
            for line in format_metadata(bench.metadata()) {
                writeln!(out, "{line}")?;
            }
        }
        let summary = format_benchmark(&bench, settings.verbose > 0)?;
        if bench.name().is_some() {
            writeln!(out, "{summary}")?;
        } else {
            writeln!(out, "Average: {summary}")?;
        }
        out.flush()?;

        write_documents(settings, &mut io::stdout().lock(), |w| bench.write_json(w))?;
        Ok(bench)
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the result document to the `--json-file`, or to `stdout` with
/// `--json` alone
fn write_documents<F>(
    settings: &RunSettings,
    stdout: &mut dyn Write,
    write: F,
) -> anyhow::Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<(), DocumentError>,
{
    if let Some(path) = &settings.json_file {
        let mut file = create_file(path)?;
        write(&mut file)?;
    } else if settings.json {
        write(stdout)?;
    }
    Ok(())
}

fn create_file(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Read back a document written with `--json-file`
pub fn load_run_result(path: impl AsRef<Path>) -> anyhow::Result<RunResult> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(RunResult::from_json(text.trim())?)
}

/// Read back a results document written with `--json-file`
pub fn load_benchmark(path: impl AsRef<Path>) -> anyhow::Result<Benchmark> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Benchmark::from_json(text.trim())?)
}
