//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("connection idle timeout")]
    IdleTimeout,

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether the error ends the connection without fault on
    /// either side.
    pub fn is_benign(&self) -> bool {
        matches!(self, ServerError::IdleTimeout | ServerError::ShuttingDown)
    }
}
