//! Item CRUD: the stock total invariant, counter bounds and role gates.

mod common;

use axum::http::StatusCode;
use stockroom_api::models::Role;

use common::{read_json, spawn_app};

fn item_body(available: i32, in_use: i32, damaged: i32, total: i32) -> serde_json::Value {
    serde_json::json!({
        "name": "Light panel",
        "description": "Bi-color LED",
        "category": "Lighting",
        "location": "Shelf B",
        "level": "staff",
        "available": available,
        "in_use": in_use,
        "damaged": damaged,
        "total": total,
    })
}

#[tokio::test]
async fn create_rejects_total_mismatch() {
    let app = spawn_app().await;
    let (_, admin) = app.token_for(Role::Admin).await;

    let response = app
        .request("POST", "/api/v1/items", Some(&admin), Some(item_body(3, 2, 1, 7)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request("POST", "/api/v1/items", Some(&admin), Some(item_body(3, 2, 1, 6)))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn create_rejects_negative_counters() {
    let app = spawn_app().await;
    let (_, admin) = app.token_for(Role::Admin).await;

    let response = app
        .request("POST", "/api/v1/items", Some(&admin), Some(item_body(-1, 0, 0, -1)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_update_is_checked_against_merged_counters() {
    let app = spawn_app().await;
    let item_id = app.seed_item("Light panel", Role::Staff, 6).await;
    let (_, admin) = app.token_for(Role::Admin).await;
    let uri = format!("/api/v1/items/{}", item_id);

    // Raising one counter without the total breaks the invariant.
    let response = app
        .request("PUT", &uri, Some(&admin), Some(serde_json::json!({"in_use": 2})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Moving stock between counters keeps it.
    let response = app
        .request(
            "PUT",
            &uri,
            Some(&admin),
            Some(serde_json::json!({"available": 4, "in_use": 2})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["available"], 4);
    assert_eq!(body["in_use"], 2);
    assert_eq!(body["total"], 6);
}

#[tokio::test]
async fn interns_can_read_but_not_write_items() {
    let app = spawn_app().await;
    let item_id = app.seed_item("Tripod", Role::Intern, 3).await;
    let (_, intern) = app.token_for(Role::Intern).await;

    let response = app
        .request("GET", &format!("/api/v1/items/{}", item_id), Some(&intern), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request("POST", "/api/v1/items", Some(&intern), Some(item_body(1, 0, 0, 1)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/items/{}", item_id),
            Some(&intern),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn categories_and_locations_are_distinct_sorted() {
    let app = spawn_app().await;
    app.seed_item("Tripod", Role::Intern, 1).await;
    app.seed_item("Dolly", Role::Staff, 1).await;

    let (_, staff) = app.token_for(Role::Staff).await;
    let response = app
        .request("GET", "/api/v1/items/categories", Some(&staff), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    // Both seeds share one category.
    assert_eq!(body.as_array().unwrap(), &vec![serde_json::json!("Test")]);
}

#[tokio::test]
async fn deleting_missing_item_is_not_found() {
    let app = spawn_app().await;
    let (_, admin) = app.token_for(Role::Admin).await;
    let response = app
        .request(
            "DELETE",
            &format!("/api/v1/items/{}", uuid::Uuid::new_v4()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
