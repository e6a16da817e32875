//! Studio inventory API: items with stock counters and access levels,
//! checkout requests with rank-based auto-approval, guest submissions
//! with email confirmation, and asynchronous image analysis.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod poller;
pub mod services;
pub mod tracing;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::cart::CartStore;
use crate::services::{
    AnalysisService, DashboardService, GuestService, ItemService, RequestService, UserService,
};

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<DbPool>,
    pub auth: Arc<AuthService>,
    pub items: ItemService,
    pub requests: RequestService,
    pub users: UserService,
    pub guests: GuestService,
    pub dashboard: DashboardService,
    pub analysis: Arc<AnalysisService>,
    pub cart: Arc<dyn CartStore>,
}

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// All `/api/v1` routes. Guest submission and confirmation are the only
/// unauthenticated endpoints; everything else requires a bearer token.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        // service status
        .route("/status", get(handlers::status::service_status))
        .route("/health", get(handlers::status::health))
        // items
        .route(
            "/items",
            get(handlers::items::list_items).post(handlers::items::create_item),
        )
        .route("/items/categories", get(handlers::items::list_categories))
        .route("/items/locations", get(handlers::items::list_locations))
        .route("/items/analyse", post(handlers::tasks::analyse_item))
        .route(
            "/items/:id",
            get(handlers::items::get_item)
                .put(handlers::items::update_item)
                .delete(handlers::items::delete_item),
        )
        // requests
        .route(
            "/requests",
            get(handlers::requests::list_requests).post(handlers::requests::create_request),
        )
        .route(
            "/requests/:id",
            get(handlers::requests::get_request)
                .put(handlers::requests::update_request)
                .delete(handlers::requests::delete_request),
        )
        .route(
            "/requests/:id/approve",
            post(handlers::requests::approve_request),
        )
        .route(
            "/requests/:id/reject",
            post(handlers::requests::reject_request),
        )
        .route(
            "/requests/:id/return",
            post(handlers::requests::return_request),
        )
        // guests
        .route(
            "/guests/requests",
            post(handlers::guests::submit_guest_request),
        )
        .route("/guests/:id", get(handlers::guests::get_guest))
        .route("/guests/:id/confirm", post(handlers::guests::confirm_guest))
        // analysis tasks
        .route("/tasks/:id/status", get(handlers::tasks::get_task))
        .route("/tasks/:id", delete(handlers::tasks::cancel_task))
        // cart
        .route(
            "/cart",
            get(handlers::cart::get_cart).delete(handlers::cart::clear_cart),
        )
        .route("/cart/items", post(handlers::cart::add_to_cart))
        .route(
            "/cart/items/:item_id",
            put(handlers::cart::set_cart_quantity).delete(handlers::cart::remove_from_cart),
        )
        // users
        .route("/users/me", get(handlers::users::me))
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // dashboard
        .route("/dashboard/stats", get(handlers::dashboard::stats))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
}

/// Assemble the full application router with middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_service = Arc::clone(&state.auth);
    let max_upload_bytes = state.config.max_upload_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .merge(openapi::swagger_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024))
        .layer(middleware::from_fn(move |req, next| {
            auth::inject_auth_service(Arc::clone(&auth_service), req, next)
        }))
        .layer(middleware::from_fn(tracing::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
