//! Error types for record loading and query execution.

use thiserror::Error;

/// Errors that can occur while loading records or executing queries.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The dataset source could not be read.
    #[error("Failed to read dataset from {location}: {source}")]
    SourceRead {
        /// Human-readable source location (path or label).
        location: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A filter specification is internally inconsistent.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A configuration value could not be parsed.
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig {
        /// Configuration key (usually an environment variable name).
        key: String,
        /// Description of the problem.
        message: String,
    },
}

impl ExecutorError {
    /// Returns true if the error originates from the dataset source.
    pub fn is_source_error(&self) -> bool {
        matches!(self, ExecutorError::SourceRead { .. })
    }
}

/// Result type for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
