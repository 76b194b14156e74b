//! Score store error types.
//!
//! Transport failures never escape the score service: they flip the session
//! offline and the call is retried against local storage. Validation errors
//! are returned to the caller so the name prompt can be shown again.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network unreachable, unexpected status, or a body that could not be decoded.
    Transport(String),

    /// Server answered 503 (explicit unavailability).
    Unavailable,

    /// Missing or malformed player name or score.
    Validation(String),

    /// Local storage read/write failed.
    Storage(String),
}

impl StoreError {
    /// Errors that switch the session to the offline backend.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Unavailable)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
            StoreError::Unavailable => write!(f, "score server unavailable"),
            StoreError::Validation(msg) => write!(f, "invalid input: {msg}"),
            StoreError::Storage(msg) => write!(f, "local storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(StoreError::Transport("refused".into()).is_connectivity());
        assert!(StoreError::Unavailable.is_connectivity());
        assert!(!StoreError::Validation("empty".into()).is_connectivity());
        assert!(!StoreError::Storage("quota".into()).is_connectivity());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Validation("name is empty".into());
        assert_eq!(err.to_string(), "invalid input: name is empty");
    }
}
