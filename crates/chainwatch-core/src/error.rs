//! Error types for the confirmed-block listener.

use thiserror::Error;

/// Errors produced by chain clients, the retry/race policies, executors and
/// the listener lifecycle.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Network or endpoint failure (connection refused, bad status, RPC error).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single attempt exceeded its time budget.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The endpoint does not (yet) know a block at this height.
    #[error("Block {height} not found")]
    NotFound { height: u64 },

    /// Every endpoint taking part in a race failed.
    #[error("All {endpoints} endpoints failed")]
    AllEndpointsFailed { endpoints: usize },

    /// Operation attempted on a disposed listener.
    #[error("Listener has been disposed")]
    Disposed,

    /// Downstream processing of one block failed.
    #[error("Executor failed: {reason}")]
    Executor { reason: String },

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// RPC payload could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl WatchError {
    /// Shorthand for an executor failure with the given reason.
    pub fn executor(reason: impl Into<String>) -> Self {
        Self::Executor {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error is transient at the single-endpoint level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::NotFound { .. }
        )
    }

    /// Returns `true` if the listener was already disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(WatchError::Transport("connection reset".into()).is_retryable());
        assert!(WatchError::Timeout { ms: 100 }.is_retryable());
        assert!(WatchError::NotFound { height: 7 }.is_retryable());
        assert!(!WatchError::Disposed.is_retryable());
        assert!(!WatchError::AllEndpointsFailed { endpoints: 3 }.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = WatchError::AllEndpointsFailed { endpoints: 2 };
        assert_eq!(err.to_string(), "All 2 endpoints failed");
        assert_eq!(
            WatchError::executor("db down").to_string(),
            "Executor failed: db down"
        );
    }
}
