//! CLI-specific error types and exit code mapping

use netsentry_core::error::{AlertError, LookupError, NetsentryError};
use netsentry_pipeline::PipelineError;

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

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from netsentry-core.
    #[error("{0}")]
    Core(#[from] NetsentryError),

    /// Pipeline assembly or collector failure.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                 |
    /// |------|-------------------------|
    /// | 0    | Success                 |
    /// | 1    | General / command error |
    /// | 2    | Configuration error     |
    /// | 10   | IO error                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_)
            | Self::Core(NetsentryError::Config(_))
            | Self::Pipeline(PipelineError::Config { .. }) => 2,
            Self::Io(_) | Self::Core(NetsentryError::Io(_)) | Self::Pipeline(PipelineError::Io(_)) => {
                10
            }
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Pipeline(_) => 1,
        }
    }
}

impl From<AlertError> for CliError {
    fn from(e: AlertError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<LookupError> for CliError {
    fn from(e: LookupError) -> Self {
        Self::Pipeline(PipelineError::Lookup(e))
    }
}
