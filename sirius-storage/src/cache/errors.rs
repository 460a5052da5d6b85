//! Cache error types.
//!
//! Cache errors never reach HTTP callers. The read-through layer logs them
//! and degrades to the store.

use thiserror::Error;

/// Errors raised by cache backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// A value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// The operation exceeded the configured bound.
    #[error("Cache operation {operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    /// Any other backend-reported failure.
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

pub type CacheResult<T> = Result<T, CacheError>;
