//! Sirius API - REST Layer
//!
//! axum routes over a cached catalog of dishes and restaurants, with
//! reservations and user profiles passed through to the record store.
//! Reads of dishes and restaurants go through a read-through cache and
//! every committed mutation evicts the cache keys it made stale.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod middleware;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{
    authenticate_bearer, generate_jwt_token, validate_jwt_token, AuthConfig, AuthContext, Claims,
    FixedClock, JwtClock, JwtSecret, SystemClock,
};
pub use catalog::CachedCatalog;
pub use config::{ApiConfig, StoreKind};
pub use db::{DbConfig, PgRecordStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
