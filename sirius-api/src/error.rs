//! API Error Types
//!
//! Every handler returns [`ApiResult`]. Errors serialize as
//! `{code, message, details?}` with the HTTP status implied by the code.
//! Store failures are logged in full and answered with a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sirius_core::{EntityKind, SiriusError, StorageError, ValidationError};
use std::fmt;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication (401)
    Unauthorized,
    InvalidToken,
    TokenExpired,

    // Authorization (403)
    Forbidden,

    // Request shape (400)
    InvalidInput,

    // Validation (422)
    ValidationFailed,
    MissingField,
    InvalidFormat,
    ReferenceNotFound,

    // Not Found (404)
    EntityNotFound,
    DishNotFound,
    RestaurantNotFound,
    ReservationNotFound,
    UserNotFound,

    // Server (500)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::ValidationFailed
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat
            | ErrorCode::ReferenceNotFound => StatusCode::UNPROCESSABLE_ENTITY,

            ErrorCode::EntityNotFound
            | ErrorCode::DishNotFound
            | ErrorCode::RestaurantNotFound
            | ErrorCode::ReservationNotFound
            | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::InvalidToken => "Invalid authentication token",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::Forbidden => "Not allowed to perform this operation",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::ReferenceNotFound => "Referenced record does not exist",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::DishNotFound => "Dish not found",
            ErrorCode::RestaurantNotFound => "Restaurant not found",
            ErrorCode::ReservationNotFound => "Reservation not found",
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
        }
    }

    /// Not-found code for a record kind.
    pub fn not_found_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Dish => ErrorCode::DishNotFound,
            EntityKind::Restaurant => ErrorCode::RestaurantNotFound,
            EntityKind::Reservation => ErrorCode::ReservationNotFound,
            EntityKind::User => ErrorCode::UserNotFound,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, referenced id)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an error with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
        .with_details(serde_json::json!({ "field": field }))
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
        .with_details(serde_json::json!({ "field": field }))
    }

    pub fn entity_not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::not_found_for(kind),
            format!("{} with id {} not found", kind, id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<SiriusError> for ApiError {
    fn from(err: SiriusError) -> Self {
        match err {
            SiriusError::Storage(StorageError::NotFound { kind, id }) => {
                ApiError::entity_not_found(kind, id)
            }
            SiriusError::Storage(StorageError::ReferenceNotFound { kind, id }) => ApiError::new(
                ErrorCode::ReferenceNotFound,
                format!("{} with id {} does not exist", kind, id),
            )
            .with_details(serde_json::json!({ "kind": kind, "id": id })),
            SiriusError::Storage(e @ StorageError::Backend { .. })
            | SiriusError::Storage(e @ StorageError::Timeout { .. }) => {
                // Store text stays in the logs.
                tracing::error!(error = %e, "Record store failure");
                ApiError::from_code(ErrorCode::DatabaseError)
            }
            SiriusError::Storage(StorageError::LockPoisoned) => {
                tracing::error!("Record store lock poisoned");
                ApiError::from_code(ErrorCode::InternalError)
            }
            SiriusError::Validation(ValidationError::RequiredFieldMissing { field }) => {
                ApiError::missing_field(&field)
            }
            SiriusError::Validation(ValidationError::InvalidValue { field, reason }) => {
                ApiError::validation_failed(format!("Invalid value for {}: {}", field, reason))
                    .with_details(serde_json::json!({ "field": field }))
            }
            SiriusError::Validation(e @ ValidationError::EmptyPatch { .. }) => {
                ApiError::validation_failed(e.to_string())
            }
            SiriusError::Forbidden(denied) => ApiError::forbidden(denied.to_string())
                .with_details(serde_json::json!({
                    "role": denied.role,
                    "operation": denied.operation,
                })),
            SiriusError::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::validation_failed(e.body_text()),
            JsonRejection::JsonSyntaxError(e) => {
                ApiError::validation_failed(format!("Malformed JSON: {}", e.body_text()))
            }
            JsonRejection::MissingJsonContentType(_) => ApiError::validation_failed(
                "Expected request with `Content-Type: application/json`",
            ),
            other => ApiError::validation_failed(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_format("id", "an integer").with_details(serde_json::json!({
            "field": "id",
            "reason": rejection.body_text(),
        }))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_failed(rejection.body_text())
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sirius_core::{AccessDenied, Operation, Role};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::ValidationFailed.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::DishNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_conversion() {
        let err: ApiError = SiriusError::not_found(EntityKind::Dish, 999).into();
        assert_eq!(err.code, ErrorCode::DishNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("999"));
    }

    #[test]
    fn test_forbidden_conversion() {
        let err: ApiError = SiriusError::from(AccessDenied {
            role: Role::User,
            operation: Operation::DeleteDish,
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.message.contains("delete_dish"));
    }

    #[test]
    fn test_store_failure_text_is_not_returned() {
        let err: ApiError =
            SiriusError::backend("dish_get", "relation \"sirius.dish\" does not exist").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("relation"));
        assert_eq!(err.message, ErrorCode::DatabaseError.default_message());
    }

    #[test]
    fn test_pool_timeout_is_database_error() {
        let err: ApiError = SiriusError::Storage(StorageError::Timeout {
            operation: "dish_get".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_conversion() {
        let err: ApiError = SiriusError::invalid("price", "must be non-negative").into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.details, Some(serde_json::json!({ "field": "price" })));

        let err: ApiError = SiriusError::Storage(StorageError::ReferenceNotFound {
            kind: EntityKind::Dish,
            id: 4,
        })
        .into();
        assert_eq!(err.code, ErrorCode::ReferenceNotFound);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Invalid token");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("Invalid token"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
