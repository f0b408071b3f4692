//! CLI-specific error types and exit code mapping

use fencecheck_conformance::ConformanceError;
use fencecheck_core::error::{ClusterError, FencecheckError};

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The control plane could not be reached.
    #[error("control plane not reachable: {0}")]
    Unreachable(String),

    /// At least one scenario did not pass.
    #[error("{failed} of {total} scenarios did not pass")]
    ScenariosFailed { failed: usize, total: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | Command error or scenario failure    |
    /// | 2    | Configuration error                  |
    /// | 3    | Control plane unreachable            |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Unreachable(_) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::ScenariosFailed { .. } => 1,
        }
    }
}

impl From<FencecheckError> for CliError {
    fn from(e: FencecheckError) -> Self {
        match e {
            FencecheckError::Config(inner) => Self::Config(inner.to_string()),
            FencecheckError::Cluster(ClusterError::Unreachable(msg)) => Self::Unreachable(msg),
            FencecheckError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<ConformanceError> for CliError {
    fn from(e: ConformanceError) -> Self {
        FencecheckError::from(e).into()
    }
}
