//! Error type for the rf CLI.

use std::process::ExitCode;

use resource_filter::FilterError;

/// Error type for command execution.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Filter compilation or evaluation error.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input is not valid JSON.
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    /// One line of newline-delimited input is not valid JSON.
    #[error("invalid JSON on line {line}: {source}")]
    JsonLine {
        /// One-based line number.
        line: usize,
        /// The parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for command execution.
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Returns the error code string for JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Filter(_) => "FILTER_ERROR",
            CliError::Config(_) => "CONFIG_ERROR",
            CliError::Io(_) => "IO_ERROR",
            CliError::Json(_) | CliError::JsonLine { .. } => "JSON_ERROR",
        }
    }

    /// Returns the process exit status for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            CliError::Filter(_) => 1,
            CliError::Io(_) => 3,
            CliError::Json(_) | CliError::JsonLine { .. } => 4,
            CliError::Config(_) => 5,
        }
    }

    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
