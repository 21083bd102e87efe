//! Error types for request handling.

use ehr_query_executor::ExecutorError;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while handling a request.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request is well-formed JSON but semantically invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The engine failed to load data or execute the request.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The request body is not valid JSON or does not match any request shape.
    #[error("Malformed request: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Returns true if the caller can fix the error by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidRequest)
    }

    /// Category reported in error responses.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::Json(_) => ErrorKind::InvalidRequest,
            ServiceError::Executor(ExecutorError::InvalidFilter(_)) => ErrorKind::InvalidRequest,
            ServiceError::Executor(ExecutorError::SourceRead { .. }) => {
                ErrorKind::SourceUnavailable
            }
            ServiceError::Executor(ExecutorError::InvalidConfig { .. }) => ErrorKind::Internal,
        }
    }
}

/// Error category carried in `{ "error": { "kind": ... } }` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request shape or values are invalid.
    InvalidRequest,
    /// The dataset could not be read.
    SourceUnavailable,
    /// Anything else.
    Internal,
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
