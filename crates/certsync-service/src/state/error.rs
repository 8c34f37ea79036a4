//! Error types for state backend operations

use thiserror::Error;

/// Errors that can occur during state backend operations
#[derive(Debug, Error)]
pub enum StateError {
    /// Connection error (Valkey/Redis unreachable)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Command timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid key or pattern
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend-specific error
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<redis::RedisError> for StateError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() {
            StateError::ConnectionError(format!("Valkey connection error: {}", err))
        } else if err.is_timeout() {
            StateError::Timeout(format!("Valkey timeout: {}", err))
        } else {
            StateError::BackendError(format!("Valkey error: {}", err))
        }
    }
}
