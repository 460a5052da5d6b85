//! HTTP scenarios for reservations and the current-user endpoints.

#[path = "support/app.rs"]
mod app_support;

use app_support::{TestApp, TestResult};
use axum::http::StatusCode;
use serde_json::json;
use sirius_core::{Reservation, Restaurant, Role, User};

async fn restaurant(app: &TestApp) -> TestResult<Restaurant> {
    app.post(
        "/restaurants",
        &app.admin()?,
        json!({ "name": "Ромашка", "address": "Сочи, Морская 5" }),
    )
    .await?
    .json()
}

fn booking(restaurant: &Restaurant) -> serde_json::Value {
    json!({
        "restaurant_id": restaurant.id,
        "date_reserv": "2026-06-12T19:30:00Z",
        "guest_count": 4,
        "comment": "У окна",
    })
}

#[tokio::test]
async fn test_any_role_can_book_for_itself() -> TestResult {
    let app = TestApp::new()?;
    let restaurant = restaurant(&app).await?;

    for (user_id, role) in [(10, Role::User), (11, Role::Staff), (12, Role::Administrator)] {
        let token = app.token(user_id, role)?;
        let response = app.post("/reservations", &token, booking(&restaurant)).await?;
        assert_eq!(response.status, StatusCode::CREATED, "{role:?}");
        let reservation: Reservation = response.json()?;
        assert_eq!(reservation.user_id.get(), user_id);
        assert!(!reservation.status);
    }

    let all: Vec<Reservation> = app.get("/reservations").await?.json()?;
    assert_eq!(all.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_booking_validation() -> TestResult {
    let app = TestApp::new()?;
    let restaurant = restaurant(&app).await?;
    let user = app.token(10, Role::User)?;

    let mut body = booking(&restaurant);
    body["guest_count"] = json!(0);
    let response = app.post("/reservations", &user, body).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut body = booking(&restaurant);
    body["restaurant_id"] = json!(999);
    let response = app.post("/reservations", &user, body).await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.error_code(), Some("REFERENCE_NOT_FOUND"));

    let anonymous = app
        .send(axum::http::Method::POST, "/reservations", None, Some(booking(&restaurant)))
        .await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_only_staff_confirms_and_cancels() -> TestResult {
    let app = TestApp::new()?;
    let restaurant = restaurant(&app).await?;
    let user = app.token(10, Role::User)?;
    let reservation: Reservation = app
        .post("/reservations", &user, booking(&restaurant))
        .await?
        .json()?;
    let uri = format!("/reservations/{}", reservation.id);

    for token in [user.clone(), app.admin()?] {
        let response = app.put(&uri, &token, json!({ "status": true })).await?;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        let response = app.delete(&uri, &token).await?;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    let confirmed = app.put(&uri, &app.staff()?, json!({ "status": true })).await?;
    assert_eq!(confirmed.status, StatusCode::OK);
    assert!(confirmed.json::<Reservation>()?.status);

    let fetched: Reservation = app.get(&uri).await?.json()?;
    assert!(fetched.status);

    let cancelled = app.delete(&uri, &app.staff()?).await?;
    assert_eq!(cancelled.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri).await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_current_user_endpoints() -> TestResult {
    let app = TestApp::new()?;
    let user = app.store.inner().insert_user("guest")?;
    let token = app.token(user.id.get(), Role::User)?;
    let restaurant = restaurant(&app).await?;

    let me = app.send(axum::http::Method::GET, "/users/me", Some(&token), None).await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json::<User>()?, user);

    app.post("/reservations", &token, booking(&restaurant)).await?;
    app.post("/reservations", &app.token(99, Role::User)?, booking(&restaurant))
        .await?;
    let mine: Vec<Reservation> = app
        .send(axum::http::Method::GET, "/users/me/reservations", Some(&token), None)
        .await?
        .json()?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].user_id, user.id);

    let renamed = app
        .put("/users/me/update", &token, json!({ "username": "gourmet" }))
        .await?;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.json::<User>()?.username, "gourmet");

    let empty = app.put("/users/me/update", &token, json!({})).await?;
    assert_eq!(empty.status, StatusCode::UNPROCESSABLE_ENTITY);

    let deleted = app.delete("/users/me/delete", &token).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.send(axum::http::Method::GET, "/users/me", Some(&token), None).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.error_code(), Some("USER_NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn test_current_user_requires_token() -> TestResult {
    let app = TestApp::new()?;
    for uri in ["/users/me", "/users/me/reservations"] {
        assert_eq!(app.get(uri).await?.status, StatusCode::UNAUTHORIZED);
    }
    Ok(())
}
