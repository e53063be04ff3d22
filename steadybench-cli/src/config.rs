//! Configuration loading from steadybench.toml
//!
//! Runner settings can be given in a `steadybench.toml` file, discovered by
//! walking up from the current directory. Command-line flags override the
//! file, which overrides the program's [`RunnerDefaults`].

use crate::Cli;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use steadybench_core::{BenchError, CalibrationConfig, parse_cpu_list};

/// File name looked up by [`SteadyConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "steadybench.toml";

/// Steadybench configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SteadyConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// `[runner]` table; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Number of worker processes
    #[serde(default)]
    pub processes: Option<usize>,
    /// Measured samples per worker
    #[serde(default)]
    pub samples: Option<usize>,
    /// Warmup samples per worker
    #[serde(default)]
    pub warmups: Option<usize>,
    /// Loops per sample, 0 to calibrate
    #[serde(default)]
    pub loops: Option<u64>,
    /// Minimum duration of one sample (e.g., "100ms")
    #[serde(default)]
    pub min_time: Option<String>,
    /// Maximum duration of one sample (e.g., "1s")
    #[serde(default)]
    pub max_time: Option<String>,
    /// CPU list workers are pinned to (e.g., "2-3")
    #[serde(default)]
    pub affinity: Option<String>,
}

impl SteadyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Discover and load configuration by walking up from the current directory
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let dir = std::env::current_dir()?;
        Self::discover_from(&dir)
    }

    /// Discover and load configuration by walking up from `start`
    pub fn discover_from(start: &Path) -> anyhow::Result<Option<Self>> {
        match find_config_file(start) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::load(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Generate a commented configuration file
    pub fn default_toml() -> String {
        r#"# Steadybench Configuration

[runner]
# Number of worker processes
processes = 25
# Measured samples per worker
samples = 3
# Warmup samples per worker
warmups = 1
# Loops per sample (0 = calibrate)
loops = 0
# Calibration window of one sample
min_time = "100ms"
max_time = "1s"
# Pin workers to these CPUs instead of the isolated ones (uncomment to enable)
# affinity = "2-3"
"#
        .to_string()
    }

    /// Parse a duration string (e.g., "1s", "100ms", "250us"); a bare number
    /// is in seconds
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let seconds_per_unit = match unit_part.to_lowercase().as_str() {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" | "sec" | "" => 1.0,
            "m" | "min" => 60.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|_| anyhow::anyhow!("Duration out of range: {}", s))
    }
}

fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Settings a benchmark program falls back to when neither the command line
/// nor the configuration file set them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerDefaults {
    /// Number of worker processes
    pub processes: usize,
    /// Measured samples per worker
    pub samples: usize,
    /// Warmup samples per worker
    pub warmups: usize,
    /// Loops per sample, 0 to calibrate
    pub loops: u64,
    /// Minimum duration of one sample, in seconds
    pub min_time: f64,
    /// Maximum duration of one sample, in seconds
    pub max_time: f64,
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self {
            processes: 25,
            samples: 3,
            warmups: 1,
            loops: 0,
            min_time: 0.1,
            max_time: 1.0,
        }
    }
}

/// Fully resolved and validated settings of one session
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Number of worker processes
    pub processes: usize,
    /// Measured samples per worker
    pub samples: usize,
    /// Warmup samples per worker
    pub warmups: usize,
    /// Loops per sample, 0 to calibrate
    pub loops: u64,
    /// Calibration window
    pub calibration: CalibrationConfig,
    /// Verbosity level (number of `-v`)
    pub verbose: u8,
    /// Write the result document to stdout
    pub json: bool,
    /// Write the result document to this file
    pub json_file: Option<PathBuf>,
    /// Worker mode: take one run in this process
    pub raw: bool,
    /// Display metadata
    pub metadata: bool,
    /// Explicit CPU list
    pub affinity: Option<String>,
}

impl RunSettings {
    /// Layer CLI flags over the configuration file over `defaults`, then
    /// validate the result before anything is timed
    pub fn resolve(
        cli: &Cli,
        config: &SteadyConfig,
        defaults: &RunnerDefaults,
    ) -> anyhow::Result<Self> {
        let runner = &config.runner;

        let min_time = match (cli.min_time, &runner.min_time) {
            (Some(secs), _) => secs,
            (None, Some(text)) => SteadyConfig::parse_duration(text)
                .context("invalid runner.min_time")?
                .as_secs_f64(),
            (None, None) => defaults.min_time,
        };
        let max_time = match (cli.max_time, &runner.max_time) {
            (Some(secs), _) => secs,
            (None, Some(text)) => SteadyConfig::parse_duration(text)
                .context("invalid runner.max_time")?
                .as_secs_f64(),
            (None, None) => defaults.max_time,
        };

        let settings = Self {
            processes: cli
                .processes
                .or(runner.processes)
                .unwrap_or(defaults.processes),
            samples: cli.samples.or(runner.samples).unwrap_or(defaults.samples),
            warmups: cli.warmups.or(runner.warmups).unwrap_or(defaults.warmups),
            loops: cli.loops.or(runner.loops).unwrap_or(defaults.loops),
            calibration: CalibrationConfig::new(min_time, max_time)?,
            verbose: cli.verbose,
            json: cli.json,
            json_file: cli.json_file.clone(),
            raw: cli.raw,
            metadata: cli.metadata || cli.verbose > 0,
            affinity: cli.affinity.clone().or_else(|| runner.affinity.clone()),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), BenchError> {
        if self.processes < 1 {
            return Err(BenchError::InvalidConfiguration(
                "processes must be >= 1".to_string(),
            ));
        }
        if let Some(list) = &self.affinity {
            parse_cpu_list(list)?;
        }
        Ok(())
    }
}
