//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`SvnCacheError`] which covers every failure mode of the
//! status cache: invoking the `svn` executable, decoding its reports, and
//! persisting snapshots and configuration. It uses `thiserror` for ergonomic
//! error definitions and includes constructors for common failure scenarios.
//!
//! # Public API
//! - [`SvnCacheError`]: Main error enum covering all failure modes
//! - [`ErrorCategory`]: How a failure is handled by a refresh cycle
//! - [`Result<T>`]: Type alias for `std::result::Result<T, SvnCacheError>`
//!
//! # Error Categories
//! - **Recoverable**: absorbed locally and surfaced as an empty/normal result
//! - **Configuration**: reported to the user once, the cycle still completes
//! - **Data**: the gathered result is dropped and the previous table kept
//! - **Fatal**: logged with full detail and converted to an empty result

use std::path::PathBuf;
use thiserror::Error;

/// Domain-specific error types for the status cache
#[derive(Error, Debug)]
pub enum SvnCacheError {
    // Working copy errors
    #[error("Not a working copy: {path}")]
    NotAWorkingCopy { path: String },

    #[error("Path not found under an unversioned parent: {path}")]
    NodeNotFound { path: String },

    // Command invocation errors
    #[error("svn executable not found at '{path}'. Check the configured CLI path.")]
    CliNotFound { path: PathBuf },

    #[error("svn executable not found in PATH")]
    CliNotInstalled,

    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Command '{command}' was aborted")]
    Aborted { command: String },

    #[error("Command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unable to reach the repository: {message}")]
    Connection { message: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // Report decoding errors
    #[error("Malformed status line: '{line}'")]
    MalformedStatusLine { line: String },

    #[error("Unknown status code '{code}' in column {column} of line '{line}'")]
    UnknownStatusCode {
        code: char,
        column: usize,
        line: String,
    },

    // File operation errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Snapshot and config errors
    #[error("Could not find cache directory")]
    CacheDirectoryNotFound,

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write snapshot '{path}': {source}")]
    SnapshotWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read snapshot '{path}': {source}")]
    SnapshotReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot '{path}': {source}")]
    SnapshotParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Background worker failed: {message}")]
    WorkerPanicked { message: String },
}

/// Convenience type alias for Results using SvnCacheError
pub type Result<T> = std::result::Result<T, SvnCacheError>;

/// How a refresh cycle treats an error raised while gathering data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Absorbed locally, surfaced only as an empty/normal result.
    Recoverable,
    /// Reported to the user once; the cycle still completes.
    Configuration,
    /// The gathered result is dropped and the previous table preserved.
    Data,
    /// Unexpected; logged with full detail and converted to an empty result.
    Fatal,
}

impl SvnCacheError {
    /// Classify this error according to the refresh-cycle error taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotAWorkingCopy { .. }
            | Self::NodeNotFound { .. }
            | Self::CliNotInstalled
            | Self::Aborted { .. } => ErrorCategory::Recoverable,
            Self::CliNotFound { .. }
            | Self::Connection { .. }
            | Self::Authentication { .. }
            | Self::Timeout { .. }
            | Self::Config { .. } => ErrorCategory::Configuration,
            Self::MalformedStatusLine { .. } | Self::UnknownStatusCode { .. } => {
                ErrorCategory::Data
            }
            _ => ErrorCategory::Fatal,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Create an aborted error
    pub fn aborted(command: impl Into<String>) -> Self {
        Self::Aborted {
            command: command.into(),
        }
    }

    /// Create a malformed status line error
    pub fn malformed_line(line: impl Into<String>) -> Self {
        Self::MalformedStatusLine { line: line.into() }
    }

    /// Create an unknown status code error
    pub fn unknown_code(code: char, column: usize, line: impl Into<String>) -> Self {
        Self::UnknownStatusCode {
            code,
            column,
            line: line.into(),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a directory creation failed error
    pub fn directory_creation_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreationFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a snapshot write failed error
    pub fn snapshot_write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SnapshotWriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a snapshot read failed error
    pub fn snapshot_read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SnapshotReadFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a snapshot parse failed error
    pub fn snapshot_parse_failed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::SnapshotParseFailed {
            path: path.into(),
            source,
        }
    }
}
