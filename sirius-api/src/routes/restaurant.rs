//! Restaurant REST API Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sirius_core::{NewRestaurant, RestaurantId, RestaurantPatch};

use crate::catalog::CachedCatalog;
use crate::error::ApiResult;
use crate::extractors::{ApiJson, CategoryFilter, PathId};
use crate::middleware::AuthExtractor;
use crate::state::AppState;

#[cfg(feature = "openapi")]
use crate::error::ApiError;
#[cfg(feature = "openapi")]
use sirius_core::{Dish, Restaurant};

/// POST /restaurants - Create a restaurant
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/restaurants",
    tag = "Restaurants",
    request_body = NewRestaurant,
    responses(
        (status = 201, description = "Restaurant created", body = Restaurant),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Administrators only", body = ApiError),
        (status = 422, description = "Invalid restaurant or unknown menu dish", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_restaurant(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    ApiJson(req): ApiJson<NewRestaurant>,
) -> ApiResult<impl IntoResponse> {
    let restaurant = catalog.create_restaurant(auth.role, req).await?;
    Ok((StatusCode::CREATED, Json(restaurant)))
}

/// GET /restaurants - List restaurants
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/restaurants",
    tag = "Restaurants",
    responses(
        (status = 200, description = "Restaurants ordered by id", body = Vec<Restaurant>),
    ),
))]
pub async fn list_restaurants(
    State(catalog): State<CachedCatalog>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.list_restaurants().await?))
}

/// GET /restaurants/{id} - Get a restaurant by ID
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/restaurants/{id}",
    tag = "Restaurants",
    params(("id" = i64, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Restaurant details", body = Restaurant),
        (status = 404, description = "Restaurant not found", body = ApiError),
    ),
))]
pub async fn get_restaurant(
    State(catalog): State<CachedCatalog>,
    PathId(id): PathId<RestaurantId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.get_restaurant(id).await?))
}

/// GET /restaurants/{id}/menu - Dishes on the menu, optionally by category
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/restaurants/{id}/menu",
    tag = "Restaurants",
    params(
        ("id" = i64, Path, description = "Restaurant ID"),
        ("category" = Option<String>, Query, description = "Category display name, database label or slug"),
    ),
    responses(
        (status = 200, description = "Menu dishes in menu order", body = Vec<Dish>),
        (status = 404, description = "Restaurant not found", body = ApiError),
        (status = 422, description = "Unknown category", body = ApiError),
    ),
))]
pub async fn restaurant_menu(
    State(catalog): State<CachedCatalog>,
    PathId(id): PathId<RestaurantId>,
    CategoryFilter(category): CategoryFilter,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.restaurant_menu(id, category).await?))
}

/// PUT /restaurants/{id} - Update a restaurant
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/restaurants/{id}",
    tag = "Restaurants",
    params(("id" = i64, Path, description = "Restaurant ID")),
    request_body = RestaurantPatch,
    responses(
        (status = 200, description = "Restaurant updated", body = Restaurant),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Administrators only", body = ApiError),
        (status = 404, description = "Restaurant not found", body = ApiError),
        (status = 422, description = "Invalid patch or unknown menu dish", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn update_restaurant(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<RestaurantId>,
    ApiJson(req): ApiJson<RestaurantPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.update_restaurant(auth.role, id, req).await?))
}

/// DELETE /restaurants/{id} - Delete a restaurant and its reservations
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/restaurants/{id}",
    tag = "Restaurants",
    params(("id" = i64, Path, description = "Restaurant ID")),
    responses(
        (status = 204, description = "Restaurant deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Administrators only", body = ApiError),
        (status = 404, description = "Restaurant not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn delete_restaurant(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<RestaurantId>,
) -> ApiResult<StatusCode> {
    catalog.delete_restaurant(auth.role, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(list_restaurants).post(create_restaurant))
        .route(
            "/restaurants/:id",
            get(get_restaurant)
                .put(update_restaurant)
                .delete(delete_restaurant),
        )
        .route("/restaurants/:id/menu", get(restaurant_menu))
}
