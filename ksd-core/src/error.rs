//! Error types for ksd-core

use thiserror::Error;

/// Main error type for the ksd-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (open, stat or read of the hot log and friends)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in the event log
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// External tool failed to start or exited non-zero
    #[error("running {command}: {message}")]
    Process { command: String, message: String },

    /// Filesystem watcher failure
    #[error("file watch error: {0}")]
    Watch(String),

    /// Background task died before producing a result
    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type alias for ksd-core
pub type Result<T> = std::result::Result<T, Error>;
