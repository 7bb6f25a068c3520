//! Store error types

use std::time::Duration;

/// Error type for backend store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("entity tag mismatch: expected={expected}, actual={actual}")]
    Conflict { expected: String, actual: String },

    #[error("store is read-only")]
    ReadOnly,
}

impl StoreError {
    /// Whether the error means the store could not answer at all,
    /// as opposed to answering with a definite outcome.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::NotFound.to_string(), "key not found");
        assert_eq!(
            StoreError::Unavailable("connection refused".to_string()).to_string(),
            "store unavailable: connection refused"
        );
        assert_eq!(
            StoreError::Conflict {
                expected: "\"1\"".to_string(),
                actual: "\"2\"".to_string()
            }
            .to_string(),
            "entity tag mismatch: expected=\"1\", actual=\"2\""
        );
    }

    #[test]
    fn test_is_unavailable() {
        assert!(StoreError::Unavailable("x".to_string()).is_unavailable());
        assert!(StoreError::Timeout(Duration::from_secs(5)).is_unavailable());
        assert!(!StoreError::NotFound.is_unavailable());
        assert!(!StoreError::ReadOnly.is_unavailable());
    }
}
