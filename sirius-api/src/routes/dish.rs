//! Dish REST API Routes
//!
//! Reads are public and served through the read-through cache. Mutations
//! require a bearer token whose role may edit menus.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sirius_core::{DishId, DishPatch, NewDish};

use crate::catalog::CachedCatalog;
use crate::error::ApiResult;
use crate::extractors::{ApiJson, CategoryFilter, PathId};
use crate::middleware::AuthExtractor;
use crate::state::AppState;

#[cfg(feature = "openapi")]
use crate::error::ApiError;
#[cfg(feature = "openapi")]
use sirius_core::Dish;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /dishes - Create a dish
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/dishes",
    tag = "Dishes",
    request_body = NewDish,
    responses(
        (status = 201, description = "Dish created", body = Dish),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Role may not edit dishes", body = ApiError),
        (status = 422, description = "Invalid dish", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_dish(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    ApiJson(req): ApiJson<NewDish>,
) -> ApiResult<impl IntoResponse> {
    let dish = catalog.create_dish(auth.role, req).await?;
    Ok((StatusCode::CREATED, Json(dish)))
}

/// GET /dishes - List dishes, optionally by category
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/dishes",
    tag = "Dishes",
    params(
        ("category" = Option<String>, Query, description = "Category display name, database label or slug"),
    ),
    responses(
        (status = 200, description = "Dishes ordered by id", body = Vec<Dish>),
        (status = 422, description = "Unknown category", body = ApiError),
    ),
))]
pub async fn list_dishes(
    State(catalog): State<CachedCatalog>,
    CategoryFilter(category): CategoryFilter,
) -> ApiResult<impl IntoResponse> {
    let dishes = catalog.list_dishes(category).await?;
    Ok(Json(dishes))
}

/// GET /dishes/{id} - Get a dish by ID
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/dishes/{id}",
    tag = "Dishes",
    params(("id" = i64, Path, description = "Dish ID")),
    responses(
        (status = 200, description = "Dish details", body = Dish),
        (status = 404, description = "Dish not found", body = ApiError),
    ),
))]
pub async fn get_dish(
    State(catalog): State<CachedCatalog>,
    PathId(id): PathId<DishId>,
) -> ApiResult<impl IntoResponse> {
    let dish = catalog.get_dish(id).await?;
    Ok(Json(dish))
}

/// PUT /dishes/{id} - Update a dish
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/dishes/{id}",
    tag = "Dishes",
    params(("id" = i64, Path, description = "Dish ID")),
    request_body = DishPatch,
    responses(
        (status = 200, description = "Dish updated", body = Dish),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Role may not edit dishes", body = ApiError),
        (status = 404, description = "Dish not found", body = ApiError),
        (status = 422, description = "Invalid patch", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn update_dish(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<DishId>,
    ApiJson(req): ApiJson<DishPatch>,
) -> ApiResult<impl IntoResponse> {
    let dish = catalog.update_dish(auth.role, id, req).await?;
    Ok(Json(dish))
}

/// DELETE /dishes/{id} - Delete a dish and unlink it from every menu
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/dishes/{id}",
    tag = "Dishes",
    params(("id" = i64, Path, description = "Dish ID")),
    responses(
        (status = 204, description = "Dish deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Role may not edit dishes", body = ApiError),
        (status = 404, description = "Dish not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn delete_dish(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<DishId>,
) -> ApiResult<StatusCode> {
    catalog.delete_dish(auth.role, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/dishes", get(list_dishes).post(create_dish))
        .route(
            "/dishes/:id",
            get(get_dish).put(update_dish).delete(delete_dish),
        )
}
