//! Error types for Sirius operations

use crate::{EntityKind, Operation, Role};
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{kind} with id {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("{kind} with id {id} referenced by the request does not exist")]
    ReferenceNotFound { kind: EntityKind, id: i64 },

    #[error("Store backend failure during {operation}: {reason}")]
    Backend { operation: String, reason: String },

    #[error("Store operation {operation} timed out")]
    Timeout { operation: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Update for {kind} changes no fields")]
    EmptyPatch { kind: EntityKind },
}

/// Raised when a role claim is outside an operation's allow-list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Role {role} may not perform {operation}")]
pub struct AccessDenied {
    pub role: Role,
    pub operation: Operation,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Sirius errors.
#[derive(Debug, Clone, Error)]
pub enum SiriusError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Forbidden: {0}")]
    Forbidden(#[from] AccessDenied),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl SiriusError {
    /// Shorthand for a missing record.
    pub fn not_found(kind: EntityKind, id: impl Into<i64>) -> Self {
        SiriusError::Storage(StorageError::NotFound {
            kind,
            id: id.into(),
        })
    }

    /// Shorthand for a field-level validation failure.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SiriusError::Validation(ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Shorthand for a store failure.
    pub fn backend(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        SiriusError::Storage(StorageError::Backend {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SiriusError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for Sirius operations.
pub type SiriusResult<T> = Result<T, SiriusError>;

// =============================================================================
// TESTS
// =============================================================================
