//! Core error types.

use thiserror::Error;

/// Errors from the aggregate engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid command: {0}")]
    InvalidCommand(i64),

    #[error("empty vector")]
    EmptyVector,
}

impl CoreError {
    /// Returns a short label suitable for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidCommand(_) => "invalid_command",
            CoreError::EmptyVector => "empty_vector",
        }
    }
}
