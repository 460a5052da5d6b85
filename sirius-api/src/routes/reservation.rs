//! Reservation REST API Routes
//!
//! Booking is open to every role and the owner is always the caller.
//! Confirming, editing and cancelling a booking is staff work.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sirius_core::{NewReservation, ReservationId, ReservationPatch};

use crate::catalog::CachedCatalog;
use crate::error::ApiResult;
use crate::extractors::{ApiJson, PathId};
use crate::middleware::AuthExtractor;
use crate::state::AppState;

#[cfg(feature = "openapi")]
use crate::error::ApiError;
#[cfg(feature = "openapi")]
use sirius_core::Reservation;

/// POST /reservations - Book a table for the caller
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/reservations",
    tag = "Reservations",
    request_body = NewReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 422, description = "Invalid reservation or unknown restaurant", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn create_reservation(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    ApiJson(req): ApiJson<NewReservation>,
) -> ApiResult<impl IntoResponse> {
    let reservation = catalog
        .create_reservation(auth.role, auth.user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /reservations - List reservations
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/reservations",
    tag = "Reservations",
    responses(
        (status = 200, description = "Reservations ordered by id", body = Vec<Reservation>),
    ),
))]
pub async fn list_reservations(
    State(catalog): State<CachedCatalog>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.list_reservations().await?))
}

/// GET /reservations/{id} - Get a reservation by ID
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = Reservation),
        (status = 404, description = "Reservation not found", body = ApiError),
    ),
))]
pub async fn get_reservation(
    State(catalog): State<CachedCatalog>,
    PathId(id): PathId<ReservationId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.get_reservation(id).await?))
}

/// PUT /reservations/{id} - Update or confirm a reservation
#[cfg_attr(feature = "openapi", utoipa::path(
    put,
    path = "/reservations/{id}",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    request_body = ReservationPatch,
    responses(
        (status = 200, description = "Reservation updated", body = Reservation),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Staff only", body = ApiError),
        (status = 404, description = "Reservation not found", body = ApiError),
        (status = 422, description = "Invalid patch", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn update_reservation(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<ReservationId>,
    ApiJson(req): ApiJson<ReservationPatch>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(catalog.update_reservation(auth.role, id, req).await?))
}

/// DELETE /reservations/{id} - Cancel a reservation
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "Reservations",
    params(("id" = i64, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Staff only", body = ApiError),
        (status = 404, description = "Reservation not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
))]
pub async fn delete_reservation(
    State(catalog): State<CachedCatalog>,
    AuthExtractor(auth): AuthExtractor,
    PathId(id): PathId<ReservationId>,
) -> ApiResult<StatusCode> {
    catalog.delete_reservation(auth.role, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/reservations",
            get(list_reservations).post(create_reservation),
        )
        .route(
            "/reservations/:id",
            get(get_reservation)
                .put(update_reservation)
                .delete(delete_reservation),
        )
}
