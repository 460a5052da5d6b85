//! Current User REST API Routes
//!
//! Every handler acts on the identity carried by the bearer token.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use sirius_core::UserPatch;

use crate::catalog::CachedCatalog;
use crate::error::ApiResult;
use crate::extractors::ApiJson;
use crate::middleware::AuthExtractor;
use crate::state::AppState;

#[cfg(feature = "openapi")]
use crate::error::ApiError;
#[cfg(feature = "openapi")]
use sirius_core::{Reservation, User};

/// GET /users/me - Profile of the caller
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User no longer exists", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn get_me(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.me(auth.user_id).await?))
}

/// GET /users/me/reservations - Reservations owned by the caller
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/users/me/reservations",
    tag = "Users",
    responses(
        (status = 200, description = "Caller's reservations", body = Vec<Reservation>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn my_reservations(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.my_reservations(auth.user_id).await?))
}

/// PUT /users/me/update - Rename the caller
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/users/me/update",
    tag = "Users",
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User no longer exists", body = ApiError),
        (status = 422, description = "Empty or taken username", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn update_me(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    ApiJson(req): ApiJson<UserPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.update_me(auth.user_id, req).await?))
}

/// DELETE /users/me/delete - Delete the caller and their reservations
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/users/me/delete",
    tag = "Users",
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User no longer exists", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn delete_me(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<StatusCode> {
    catalog.delete_me(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/me/reservations", get(my_reservations))
        .route("/users/me/update", put(update_me))
        .route("/users/me/delete", delete(delete_me))
}
