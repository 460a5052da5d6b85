//! HTTP scenarios for restaurants, their menus and the dish/menu cache
//! interplay.

#[path = "support/app.rs"]
mod app_support;

use app_support::{TestApp, TestResult};
use axum::http::StatusCode;
use serde_json::json;
use sirius_core::{Dish, DishId, Restaurant, Role};

async fn create_dish(app: &TestApp, category: &str, name: &str) -> TestResult<Dish> {
    let response = app
        .post(
            "/dishes",
            &app.staff()?,
            json!({ "category": category, "name": name, "price": 100 }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::CREATED);
    response.json()
}

async fn create_restaurant(app: &TestApp, menu: &[DishId]) -> TestResult<Restaurant> {
    let response = app
        .post(
            "/restaurants",
            &app.admin()?,
            json!({ "name": "Ромашка", "address": "Сочи, Морская 5", "menu": menu }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_restaurant_crud_flow() -> TestResult {
    let app = TestApp::new()?;
    let admin = app.admin()?;
    let restaurant = create_restaurant(&app, &[]).await?;

    let listed: Vec<Restaurant> = app.get("/restaurants").await?.json()?;
    assert_eq!(listed, vec![restaurant.clone()]);

    let renamed = app
        .put(
            &format!("/restaurants/{}", restaurant.id),
            &admin,
            json!({ "name": "Ромашка у моря" }),
        )
        .await?;
    assert_eq!(renamed.status, StatusCode::OK);

    let fetched: Restaurant = app
        .get(&format!("/restaurants/{}", restaurant.id))
        .await?
        .json()?;
    assert_eq!(fetched.name, "Ромашка у моря");

    let listed: Vec<Restaurant> = app.get("/restaurants").await?.json()?;
    assert_eq!(listed[0].name, "Ромашка у моря");

    let deleted = app
        .delete(&format!("/restaurants/{}", restaurant.id), &admin)
        .await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let missing = app.get(&format!("/restaurants/{}", restaurant.id)).await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code(), Some("RESTAURANT_NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn test_staff_cannot_edit_restaurants() -> TestResult {
    let app = TestApp::new()?;
    let response = app
        .post(
            "/restaurants",
            &app.staff()?,
            json!({ "name": "Ромашка", "address": "Сочи" }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_menu_must_reference_existing_dishes() -> TestResult {
    let app = TestApp::new()?;
    let response = app
        .post(
            "/restaurants",
            &app.admin()?,
            json!({ "name": "Ромашка", "address": "Сочи", "menu": [999] }),
        )
        .await?;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.error_code(), Some("REFERENCE_NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn test_menu_filtered_by_category() -> TestResult {
    let app = TestApp::new()?;
    let soup = create_dish(&app, "Суп", "Борщ").await?;
    let tea = create_dish(&app, "Горячий напиток", "Чай").await?;
    let restaurant = create_restaurant(&app, &[tea.id, soup.id]).await?;

    let menu: Vec<Dish> = app
        .get(&format!("/restaurants/{}/menu", restaurant.id))
        .await?
        .json()?;
    assert_eq!(menu.iter().map(|d| d.id).collect::<Vec<_>>(), vec![soup.id, tea.id]);

    let drinks: Vec<Dish> = app
        .get(&format!("/restaurants/{}/menu?category=hot_drink", restaurant.id))
        .await?
        .json()?;
    assert_eq!(drinks, vec![tea]);

    let missing = app.get("/restaurants/999/menu").await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_deleted_dish_leaves_cached_menu() -> TestResult {
    let app = TestApp::new()?;
    let soup = create_dish(&app, "Суп", "Борщ").await?;
    let salad = create_dish(&app, "Салат", "Оливье").await?;
    let restaurant = create_restaurant(&app, &[soup.id, salad.id]).await?;

    // Warm both restaurant keys.
    let before: Restaurant = app
        .get(&format!("/restaurants/{}", restaurant.id))
        .await?
        .json()?;
    assert_eq!(before.menu, vec![soup.id, salad.id]);
    app.get("/restaurants").await?;

    let deleted = app.delete(&format!("/dishes/{}", soup.id), &app.staff()?).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let after: Restaurant = app
        .get(&format!("/restaurants/{}", restaurant.id))
        .await?
        .json()?;
    assert_eq!(after.menu, vec![salad.id]);

    let listed: Vec<Restaurant> = app.get("/restaurants").await?.json()?;
    assert_eq!(listed[0].menu, vec![salad.id]);
    Ok(())
}

#[tokio::test]
async fn test_restaurant_edit_keeps_dish_cache_warm() -> TestResult {
    let app = TestApp::new()?;
    let soup = create_dish(&app, "Суп", "Борщ").await?;
    app.get(&format!("/dishes/{}", soup.id)).await?;
    app.get("/dishes").await?;

    let restaurant = create_restaurant(&app, &[soup.id]).await?;
    app.put(
        &format!("/restaurants/{}", restaurant.id),
        &app.admin()?,
        json!({ "menu": [] }),
    )
    .await?;
    app.delete(&format!("/restaurants/{}", restaurant.id), &app.admin()?)
        .await?;

    app.get(&format!("/dishes/{}", soup.id)).await?;
    app.get("/dishes").await?;
    assert_eq!(app.store.calls("dish_get"), 1);
    assert_eq!(app.store.calls("dish_list"), 1);
    Ok(())
}

#[tokio::test]
async fn test_reads_are_public_but_bad_tokens_are_not() -> TestResult {
    let app = TestApp::new()?;
    assert_eq!(app.get("/restaurants").await?.status, StatusCode::OK);

    let response = app
        .send(axum::http::Method::GET, "/restaurants", Some("garbage"), None)
        .await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let user = app.token(3, Role::User)?;
    let response = app
        .send(axum::http::Method::GET, "/restaurants", Some(&user), None)
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}
