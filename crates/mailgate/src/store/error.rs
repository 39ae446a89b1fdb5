//! Store error types.

use thiserror::Error;

/// Errors that can occur during shared store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Failed to reach the store backend.
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// A store operation timed out.
    #[error("Store operation timed out: {0}")]
    Timeout(String),

    /// The backend rejected or failed an operation.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Connection("redis://localhost:6379".to_string());
        assert!(err.to_string().contains("redis://localhost:6379"));

        let err = StoreError::Timeout("MGET".to_string());
        assert!(err.to_string().contains("MGET"));

        let err = StoreError::Backend("WRONGTYPE".to_string());
        assert!(err.to_string().contains("WRONGTYPE"));
    }

    #[test]
    fn test_store_error_clone() {
        let err = StoreError::Backend("test".to_string());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
