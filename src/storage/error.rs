//! Storage boundary error types
//!
//! Failures raised by Repository implementations. The query layer never
//! retries these; they propagate unchanged to the caller.

use thiserror::Error;

/// Errors that can occur at the storage boundary
#[derive(Error, Debug)]
pub enum StorageError {
    /// Could not reach the backing store
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backing store did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backing store rejected or failed the operation
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Connection("replica set unreachable".to_string());
        assert_eq!(err.to_string(), "Connection error: replica set unreachable");
    }
}
