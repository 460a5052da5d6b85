//! REST API Routes Module
//!
//! Route handlers organized by entity type, plus the router builder that
//! stacks authentication, observability, timeouts and CORS on top of them.

pub mod dish;
pub mod health;
pub mod reservation;
pub mod restaurant;
pub mod user;

use std::time::Duration;

use axum::{
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::AuthConfig;
use crate::catalog::CachedCatalog;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use dish::create_router as dish_router;
pub use health::create_router as health_router;
pub use reservation::create_router as reservation_router;
pub use restaurant::create_router as restaurant_router;
pub use user::create_router as user_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set SIRIUS_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting origins");
        let origins: Vec<header::HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Every route, without state or layers.
fn build_routes() -> Router<AppState> {
    let router = Router::new()
        .merge(dish::create_router())
        .merge(restaurant::create_router())
        .merge(reservation::create_router())
        .merge(user::create_router())
        .merge(health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", get(openapi_json));

    router
}

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. Timeout - bounds the whole request
/// 3. HTTP trace spans
/// 4. Observability - metrics labelled by matched route
/// 5. Auth - validates a present bearer token
///
/// In production (`SIRIUS_ENVIRONMENT=production`) the JWT secret and CORS
/// origins are validated and a weak configuration refuses to start.
pub fn create_api_router(
    catalog: CachedCatalog,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    if auth_config.is_production() {
        auth_config.validate_for_production()?;
        validate_api_config_for_production(api_config)?;
    }

    let auth_state = AuthMiddlewareState::new(auth_config);
    let state = AppState::new(catalog);

    Ok(build_routes()
        .layer(from_fn_with_state(auth_state, auth_middleware))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(api_config.request_timeout))
        .layer(build_cors_layer(api_config))
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_cors_origins() {
        let config = ApiConfig::default();
        assert!(validate_api_config_for_production(&config).is_err());

        let config = ApiConfig {
            cors_origins: vec!["https://sirius.example".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
