//! Error types for the shielding statistics layer.

use thiserror::Error;

/// Unified error type for SHIELDSIM operations.
#[derive(Error, Debug)]
pub enum ShieldError {
    /// Filesystem errors (report folders, report files, ntuple CSVs)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors (config, run summary, event records)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed line in an event replay file
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// No free report file name within the probe limit
    #[error("No free report file name after {probes} probes starting at {start}")]
    ReportNameExhausted { start: u32, probes: u32 },
}

impl ShieldError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ShieldError::Config(message.into())
    }

    /// Creates a parse error for a replay line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ShieldError::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for ShieldError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ShieldError::ThreadPool(err.to_string())
    }
}

/// Result type alias for SHIELDSIM operations.
pub type Result<T> = std::result::Result<T, ShieldError>;
