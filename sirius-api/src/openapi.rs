//! OpenAPI Specification for the Sirius API
//!
//! Generated by utoipa from the route annotations and the domain schemas.
//! Compiled only with the `openapi` feature.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{
    CacheHealth, ComponentHealth, HealthDetails, HealthResponse, HealthStatus,
};
use crate::routes::{dish, health, reservation, restaurant, user};
use crate::telemetry::metrics;

use sirius_core::{
    Dish, DishCategory, DishId, DishPatch, EntityKind, NewDish, NewReservation, NewRestaurant,
    Reservation, ReservationId, ReservationPatch, Restaurant, RestaurantId, RestaurantPatch,
    Role, User, UserId, UserPatch,
};

/// OpenAPI document for the Sirius API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sirius API",
        version = "0.1.0",
        description = "Restaurant reservation backend with cached dish and restaurant catalogs",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Dishes", description = "Dish catalog, cached by id and by category"),
        (name = "Restaurants", description = "Restaurants and their menus"),
        (name = "Reservations", description = "Table bookings"),
        (name = "Users", description = "Profile of the authenticated caller"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        dish::create_dish,
        dish::list_dishes,
        dish::get_dish,
        dish::update_dish,
        dish::delete_dish,

        restaurant::create_restaurant,
        restaurant::list_restaurants,
        restaurant::get_restaurant,
        restaurant::restaurant_menu,
        restaurant::update_restaurant,
        restaurant::delete_restaurant,

        reservation::create_reservation,
        reservation::list_reservations,
        reservation::get_reservation,
        reservation::update_reservation,
        reservation::delete_reservation,

        user::get_me,
        user::my_reservations,
        user::update_me,
        user::delete_me,

        health::ping,
        health::liveness,
        health::readiness,

        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            Dish, NewDish, DishPatch, DishCategory, DishId,
            Restaurant, NewRestaurant, RestaurantPatch, RestaurantId,
            Reservation, NewReservation, ReservationPatch, ReservationId,
            User, UserPatch, UserId,
            Role, EntityKind,

            HealthResponse, HealthStatus, HealthDetails, ComponentHealth, CacheHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme referenced by protected routes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT carrying the caller's user id and role"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Sirius API");

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Dish"));
        assert!(components.schemas.contains_key("ApiError"));
        Ok(())
    }

    #[test]
    fn test_every_route_documented() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        let doc: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Generated JSON invalid: {}", e))?;
        let paths = doc["paths"]
            .as_object()
            .ok_or_else(|| "paths missing".to_string())?;

        for path in [
            "/dishes",
            "/dishes/{id}",
            "/restaurants",
            "/restaurants/{id}",
            "/restaurants/{id}/menu",
            "/reservations",
            "/reservations/{id}",
            "/users/me",
            "/users/me/reservations",
            "/users/me/update",
            "/users/me/delete",
            "/health/ready",
            "/metrics",
        ] {
            assert!(paths.contains_key(path), "{path} missing from OpenAPI document");
        }
        Ok(())
    }
}
