//! Key-value store error types

use thiserror::Error;

/// Errors that can occur during state store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the backend
    #[error("State store connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a stored record
    #[error("State store serialization error: {0}")]
    SerializationError(String),

    /// Operation did not finish within the configured bound
    #[error("State store operation timed out: {0}")]
    Timeout(String),

    /// Backend is temporarily rejected by its circuit breaker
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// Generic backend error
    #[error("State store backend error: {0}")]
    BackendError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<StoreError> for crate::error::OrchestratorError {
    fn from(err: StoreError) -> Self {
        crate::error::OrchestratorError::Persistence(err.to_string())
    }
}

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;
