//! Image analysis over the HTTP surface: upload dispatch, status
//! polling, cancellation and the role gate, against a stubbed backend.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use stockroom_api::models::Role;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{read_json, spawn_app_with_analysis};

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn multipart_body(bytes: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"item.jpg\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    (
        format!("multipart/form-data; boundary={}", BOUNDARY),
        body,
    )
}

async fn upload(app: &common::TestApp, token: &str, bytes: &[u8]) -> axum::response::Response {
    let (content_type, body) = multipart_body(bytes);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/items/analyse")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn upload_dispatches_and_status_becomes_succeeded() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/analyse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "task-9"})),
        )
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/task-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "SUCCESS",
            "result": {
                "name": "Fresnel light",
                "description": "650W tungsten",
                "category": "Lighting",
                "level": "staff",
                "available": 1
            }
        })))
        .mount(&backend)
        .await;

    let app = spawn_app_with_analysis(backend.uri()).await;
    let (_, staff) = app.token_for(Role::Staff).await;

    let response = upload(&app, &staff, b"jpeg-bytes").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json(response).await;
    assert_eq!(body["task_id"], "task-9");

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let response = app
        .request("GET", "/api/v1/tasks/task-9/status", Some(&staff), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["state"], "succeeded");
    assert_eq!(body["result"]["name"], "Fresnel light");
    assert_eq!(body["result"]["level"], "staff");
}

#[tokio::test]
async fn analysis_requires_staff_role() {
    let backend = MockServer::start().await;
    let app = spawn_app_with_analysis(backend.uri()).await;
    let (_, intern) = app.token_for(Role::Intern).await;

    let response = upload(&app, &intern, b"jpeg-bytes").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn backend_outage_is_a_bad_gateway() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/analyse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    let app = spawn_app_with_analysis(backend.uri()).await;
    let (_, staff) = app.token_for(Role::Staff).await;

    let response = upload(&app, &staff, b"jpeg-bytes").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn cancel_stops_an_in_flight_task() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/analyse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"task_id": "task-slow"})),
        )
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/task-slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "PENDING",
            "result": null
        })))
        .mount(&backend)
        .await;

    let app = spawn_app_with_analysis(backend.uri()).await;
    let (_, staff) = app.token_for(Role::Staff).await;

    let response = upload(&app, &staff, b"jpeg-bytes").await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .request("DELETE", "/api/v1/tasks/task-slow", Some(&staff), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let backend = MockServer::start().await;
    let app = spawn_app_with_analysis(backend.uri()).await;
    let (_, staff) = app.token_for(Role::Staff).await;

    let response = app
        .request("GET", "/api/v1/tasks/no-such-task/status", Some(&staff), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
