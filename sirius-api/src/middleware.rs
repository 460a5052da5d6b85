//! Axum middleware for bearer authentication.
//!
//! Catalog reads are public, so a request without an `Authorization` header
//! passes through anonymously. A header that is present must carry a valid
//! token; otherwise the request is rejected with 401 before any handler runs.
//! Handlers that need an identity take an [`AuthExtractor`].

use crate::auth::{authenticate_bearer, AuthConfig, AuthContext};
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

/// Validate a present bearer token and attach its [`AuthContext`].
///
/// # Example
///
/// ```rust,ignore
/// let auth_state = AuthMiddlewareState::new(AuthConfig::from_env());
/// let app = Router::new()
///     .route("/dishes", post(create_dish))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let header = match request.headers().get(AUTHORIZATION) {
        None => return Ok(next.run(request).await),
        Some(value) => value
            .to_str()
            .map_err(|_| {
                AuthMiddlewareError(ApiError::invalid_token(
                    "Authorization header is not valid ASCII",
                ))
            })?
            .to_string(),
    };

    let auth_context =
        authenticate_bearer(&state.auth_config, &header).map_err(AuthMiddlewareError)?;
    tracing::debug!(
        user_id = %auth_context.user_id,
        role = %auth_context.role,
        "Authenticated request"
    );

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Middleware rejection carrying an [`ApiError`].
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Authenticated caller. Rejects with 401 on anonymous requests.
#[derive(Debug, Clone, Copy)]
pub struct AuthExtractor(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::unauthorized(
                    "Authentication required: provide 'Authorization: Bearer <token>'",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
