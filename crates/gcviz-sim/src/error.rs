//! Error types for collector runs, parsing, persistence and configuration.

use crate::model::Algorithm;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single collector run.
///
/// These are fatal to one algorithm's result and never to the whole
/// simulation request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("{algorithm} executable not found: {}", .path.display())]
    ExecutableNotFound { algorithm: Algorithm, path: PathBuf },

    #[error("{algorithm} simulator timed out after {}s", .timeout.as_secs())]
    ProcessTimeout { algorithm: Algorithm, timeout: Duration },

    #[error("{algorithm} simulator error: {message}")]
    ProcessExecutionError { algorithm: Algorithm, message: String },

    #[error("Invalid simulation parameters: {0}")]
    InvalidParameters(String),
}

/// Non-fatal problem found while parsing collector output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseWarning {
    #[error("No stats block found for {algorithm}")]
    MissingBlock { algorithm: Algorithm },

    #[error("Stats block for {algorithm} has no closing marker")]
    UnterminatedBlock { algorithm: Algorithm },

    #[error("Failed to parse {key}={value}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure to write a result artifact. Logged, never propagated.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

/// A simulation parameter outside the configured limits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("Invalid scenario '{given}'. Use: {}", .known.join(", "))]
    UnknownScenario { given: String, known: Vec<String> },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
}
