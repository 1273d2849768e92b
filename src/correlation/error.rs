//! Error types for correlation waits

use thiserror::Error;

/// Failure of a correlated wait.
///
/// One uniform family regardless of what went wrong on the transport, so
/// callers need a single failure-handling path. Clonable because a settled
/// outcome is shared by every waiter on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No response arrived before the deadline
    #[error("timed out waiting for response with key '{key}'")]
    Timeout { key: String },

    /// The responding service reported a failure
    #[error("upstream failure for key '{key}': {message}")]
    Upstream { key: String, message: String },
}

impl CorrelationError {
    pub fn key(&self) -> &str {
        match self {
            CorrelationError::Timeout { key } => key,
            CorrelationError::Upstream { key, .. } => key,
        }
    }
}
