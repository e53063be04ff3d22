//! Worker-side errors

use steadybench_ipc::ModelError;
use steadybench_stats::StatsError;
use thiserror::Error;

/// Errors raised while configuring or running a measurement
#[derive(Debug, Error)]
pub enum BenchError {
    /// Bad user or program configuration, detected before any timing
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An explicit CPU list was requested on a host that cannot pin
    #[error("CPU affinity {0} requested but not available on this platform")]
    AffinityUnavailable(String),

    /// The OS refused the affinity change
    #[error("failed to set CPU affinity: {0}")]
    Affinity(#[source] std::io::Error),

    /// Statistics over the collected samples failed
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// A sample violated the result model (negative or non-finite timing)
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl BenchError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        BenchError::InvalidConfiguration(message.into())
    }
}
