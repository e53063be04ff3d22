//! Result Types
//!
//! A [`RunResult`] is filled in by exactly one worker process and is never
//! touched again once it has been handed to the parent. A [`Benchmark`] owns
//! its runs by value, in the order the workers were spawned.

use crate::metadata::{Metadata, keys};
use thiserror::Error;

/// Violations of the result model invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A sample was negative, NaN or infinite
    #[error("samples must be finite and >= 0, got {0}")]
    InvalidSample(f64),

    /// A loop count of zero
    #[error("{0} must be >= 1")]
    InvalidLoops(&'static str),

    /// An empty metadata key or value
    #[error("metadata {0} must be a non-empty string")]
    EmptyMetadata(String),
}

fn check_sample(value: f64) -> Result<f64, ModelError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ModelError::InvalidSample(value))
    }
}

/// One process's observations
///
/// Samples are already normalized to seconds per logical iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    loops: Option<u64>,
    inner_loops: Option<u64>,
    warmups: Vec<f64>,
    samples: Vec<f64>,
    metadata: Metadata,
}

impl RunResult {
    /// Create an empty run. `loops` is `None` before calibration.
    pub fn new(loops: Option<u64>) -> Result<Self, ModelError> {
        if loops == Some(0) {
            return Err(ModelError::InvalidLoops("loops"));
        }
        Ok(Self {
            loops,
            ..Self::default()
        })
    }

    /// Build a run from already-collected sequences, validating every value
    pub fn from_parts(
        loops: Option<u64>,
        warmups: Vec<f64>,
        samples: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let mut run = Self::new(loops)?;
        for value in warmups {
            run.push_warmup(value)?;
        }
        for value in samples {
            run.push_sample(value)?;
        }
        Ok(run)
    }

    /// Record the inner-loop divisor applied to every sample
    pub fn with_inner_loops(mut self, inner_loops: Option<u64>) -> Result<Self, ModelError> {
        if inner_loops == Some(0) {
            return Err(ModelError::InvalidLoops("inner_loops"));
        }
        self.inner_loops = inner_loops;
        Ok(self)
    }

    /// Replace the metadata map
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Append a warmup observation
    pub fn push_warmup(&mut self, value: f64) -> Result<(), ModelError> {
        self.warmups.push(check_sample(value)?);
        Ok(())
    }

    /// Append a measured observation
    pub fn push_sample(&mut self, value: f64) -> Result<(), ModelError> {
        self.samples.push(check_sample(value)?);
        Ok(())
    }

    /// Inner executions per measured sample
    pub fn loops(&self) -> Option<u64> {
        self.loops
    }

    /// Inner-loop divisor, if the sample function runs its own inner loop
    pub fn inner_loops(&self) -> Option<u64> {
        self.inner_loops
    }

    /// Warmup observations, excluded from statistics
    pub fn warmups(&self) -> &[f64] {
        &self.warmups
    }

    /// Measured observations in measurement order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Metadata collected by the worker
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable metadata, for collection before the run is handed over
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Ordered collection of runs plus aggregate metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Benchmark {
    name: Option<String>,
    metadata: Metadata,
    runs: Vec<RunResult>,
}

/// Alias matching the name of the serialized `results` document
pub type Results = Benchmark;

impl Benchmark {
    /// Create an empty benchmark
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            ..Self::default()
        }
    }

    /// Create a benchmark from parts
    pub fn from_parts(name: Option<String>, metadata: Metadata, runs: Vec<RunResult>) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            metadata,
            runs,
        }
    }

    /// Append a finished run
    pub fn add_run(&mut self, run: RunResult) {
        self.runs.push(run);
    }

    /// Benchmark name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Explicit aggregate metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable aggregate metadata
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Runs in worker-spawn order
    pub fn runs(&self) -> &[RunResult] {
        &self.runs
    }

    /// Whether no run was recorded
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Every measured sample of every run, flattened in run order
    pub fn samples(&self) -> Vec<f64> {
        self.runs
            .iter()
            .flat_map(|run| run.samples.iter().copied())
            .collect()
    }

    /// Loop count shared by every run, `None` if unset or if runs disagree
    pub fn uniform_loops(&self) -> Option<u64> {
        uniform(self.runs.iter().map(|run| run.loops))?
    }

    /// Sample count shared by every run
    pub fn uniform_sample_count(&self) -> Option<usize> {
        uniform(self.runs.iter().map(|run| run.samples.len()))
    }

    /// Warmup count shared by every run
    pub fn uniform_warmup_count(&self) -> Option<usize> {
        uniform(self.runs.iter().map(|run| run.warmups.len()))
    }

    /// Explicit metadata merged with every run metadata pair that is
    /// identical across all runs. Explicit values win.
    pub fn common_metadata(&self) -> Metadata {
        let mut merged = self.metadata.clone();
        let Some((first, rest)) = self.runs.split_first() else {
            return merged;
        };

        for (key, value) in first.metadata.iter() {
            // Per-run loop counts are summarized separately
            if key == keys::LOOPS || key == keys::INNER_LOOPS {
                continue;
            }
            if rest.iter().all(|run| run.metadata.get(key) == Some(value)) {
                // both strings are non-empty, insert cannot fail
                let _ = merged.insert_missing(key, value);
            }
        }
        merged
    }
}

/// The single value produced by `values`, `None` if empty or not all equal
fn uniform<T: PartialEq>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    for value in values {
        if value != first {
            return None;
        }
    }
    Some(first)
}
