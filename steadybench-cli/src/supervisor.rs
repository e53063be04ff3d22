//! Supervisor Process
//!
//! Spawns one worker process per run, one at a time, and collects the single
//! `run_result` document each worker writes to stdout.

use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use steadybench_ipc::{Benchmark, DocumentError, RunResult};
use thiserror::Error;
use tracing::{debug, info};

/// Why a worker did not produce a run
#[derive(Debug, Error)]
pub enum WorkerFailure {
    /// The process exited unsuccessfully
    #[error("exited with {status}{}", stderr_suffix(.stderr))]
    Exit {
        /// Exit status of the worker
        status: ExitStatus,
        /// Everything the worker wrote to stderr
        stderr: String,
    },

    /// The process succeeded but its stdout is not a valid run document
    #[error("invalid result document: {0}")]
    Document(#[from] DocumentError),
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}

/// Errors that abort a session
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker program could not be started
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        /// 1-based worker index
        index: usize,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// A worker failed; no later worker was spawned
    #[error("worker {index} of {nprocess} failed: {reason}")]
    WorkerFailed {
        /// 1-based worker index
        index: usize,
        /// Number of workers the session asked for
        nprocess: usize,
        /// What went wrong
        reason: WorkerFailure,
    },
}

impl SupervisorError {
    /// 1-based index of the failing worker
    pub fn worker_index(&self) -> usize {
        match self {
            SupervisorError::Spawn { index, .. } | SupervisorError::WorkerFailed { index, .. } => {
                *index
            }
        }
    }
}

/// Hook that may append arguments to every worker command line
pub type PrepareArgs = Box<dyn Fn(&mut Vec<OsString>)>;

/// Per-run settings forwarded to every worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerArgs {
    /// Measured samples per worker
    pub samples: usize,
    /// Warmup samples per worker
    pub warmups: usize,
    /// Loops per sample, already calibrated
    pub loops: u64,
    /// Verbosity forwarded as `-v...`
    pub verbose: u8,
    /// CPU list forwarded as `--affinity=LIST`
    pub affinity: Option<String>,
}

/// How to start a worker: program, fixed arguments and forwarded settings
pub struct WorkerSpec {
    program: PathBuf,
    program_args: Vec<OsString>,
    args: WorkerArgs,
    prepare_args: Option<PrepareArgs>,
}

impl WorkerSpec {
    /// Spec re-running `program`
    pub fn new(program: impl Into<PathBuf>, args: WorkerArgs) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            args,
            prepare_args: None,
        }
    }

    /// Spec re-running the current executable
    pub fn current_exe(args: WorkerArgs) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args))
    }

    /// Arguments placed before the worker flags (e.g. a script path)
    pub fn with_program_args<I, S>(mut self, program_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = program_args.into_iter().map(Into::into).collect();
        self
    }

    /// Install a hook run on the argument list before every spawn
    pub fn with_prepare_args(mut self, hook: PrepareArgs) -> Self {
        self.prepare_args = Some(hook);
        self
    }

    /// Program being spawned
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Forwarded settings
    pub fn worker_args(&self) -> &WorkerArgs {
        &self.args
    }

    /// Full argument list of a worker:
    /// `PROGRAM_ARGS --raw --json --samples N --warmups N --loops N [-v..] [--affinity=LIST]`
    pub fn args(&self) -> Vec<OsString> {
        let mut args = self.program_args.clone();
        args.extend(
            [
                "--raw".to_string(),
                "--json".to_string(),
                "--samples".to_string(),
                self.args.samples.to_string(),
                "--warmups".to_string(),
                self.args.warmups.to_string(),
                "--loops".to_string(),
                self.args.loops.to_string(),
            ]
            .map(OsString::from),
        );
        if self.args.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.args.verbose as usize)).into());
        }
        if let Some(affinity) = &self.args.affinity {
            args.push(format!("--affinity={affinity}").into());
        }
        if let Some(hook) = &self.prepare_args {
            hook(&mut args);
        }
        args
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("program", &self.program)
            .field("program_args", &self.program_args)
            .field("args", &self.args)
            .field("prepare_args", &self.prepare_args.is_some())
            .finish()
    }
}

/// Runs `processes` workers sequentially and aggregates their runs
#[derive(Debug)]
pub struct Supervisor {
    spec: WorkerSpec,
    processes: usize,
    forward_stderr: bool,
}

impl Supervisor {
    /// Create a supervisor
    pub fn new(spec: WorkerSpec, processes: usize) -> Self {
        Self {
            spec,
            processes,
            forward_stderr: false,
        }
    }

    /// Copy each successful worker's stderr to ours (verbose mode)
    pub fn forward_stderr(mut self, forward: bool) -> Self {
        self.forward_stderr = forward;
        self
    }

    /// Spec used for every worker
    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    /// Spawn every worker in turn
    ///
    /// `on_run(index, run)` is called after each worker, with a 1-based index.
    /// The first failure aborts the session and no benchmark is returned.
    pub fn run<F>(
        &self,
        name: Option<String>,
        mut on_run: F,
    ) -> Result<Benchmark, SupervisorError>
    where
        F: FnMut(usize, &RunResult),
    {
        let mut bench = Benchmark::new(name);
        for index in 1..=self.processes {
            let run = self.spawn_worker(index)?;
            on_run(index, &run);
            bench.add_run(run);
        }
        info!(runs = bench.runs().len(), "all workers finished");
        Ok(bench)
    }

    /// Spawn worker `index` and wait for its run
    pub fn spawn_worker(&self, index: usize) -> Result<RunResult, SupervisorError> {
        debug!(
            index,
            nprocess = self.processes,
            program = %self.spec.program.display(),
            "spawning worker"
        );
        let output = self
            .spec
            .command()
            .output()
            .map_err(|source| SupervisorError::Spawn { index, source })?;

        let failed = |reason| SupervisorError::WorkerFailed {
            index,
            nprocess: self.processes,
            reason,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(failed(WorkerFailure::Exit {
                status: output.status,
                stderr: stderr.into_owned(),
            }));
        }
        if self.forward_stderr && !stderr.is_empty() {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(stderr.as_bytes());
            let _ = err.flush();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let run = RunResult::from_json(stdout.trim())
            .map_err(|e| failed(WorkerFailure::Document(e)))?;
        debug!(index, samples = run.samples().len(), "worker finished");
        Ok(run)
    }
}
