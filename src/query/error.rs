//! Query error types
//!
//! Malformed-request errors surface from argument parsing; contract
//! violations (a delta with no period, a storage row missing its expected
//! fields) fail loudly rather than producing a quiet wrong answer; storage
//! failures pass through unchanged.

use crate::results::FillError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while building or executing a query
#[derive(Error, Debug)]
pub enum QueryError {
    /// A time argument was not a valid RFC 3339 timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A period argument named no known granularity
    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    /// A delta argument was not an integer
    #[error("Invalid delta: {0}")]
    InvalidDelta(String),

    /// A limit argument was not a non-negative integer
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// A filter argument lacked its `key:value` separator
    #[error("Invalid filter expression, expected `key:value`: {0}")]
    InvalidFilter(String),

    /// A collect argument named an unknown method
    #[error("Unknown collect method: {0}")]
    UnknownCollectMethod(String),

    /// A relative window was requested without a period to measure it in
    #[error("A delta window requires a period")]
    DeltaWithoutPeriod,

    /// Storage layer failure, propagated unchanged
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A storage row broke the result-shape contract
    #[error("Malformed result: {0}")]
    MalformedResult(#[from] FillError),
}

/// Result type alias for query operations
pub type QueryResult<T> = Result<T, QueryError>;
