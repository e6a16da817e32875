//! Inventory item endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, no_content, ok, PaginatedResponse, PaginationParams};
use crate::services::items::{CreateItemInput, ItemFilter, UpdateItemInput};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated item list"),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ItemFilter>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadItems, &Resource::System))?;
    let (items, total) = state
        .items
        .list_items(filter, pagination.page(), pagination.per_page())
        .await?;
    Ok(ok(PaginatedResponse::new(
        items,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    responses(
        (status = 200, description = "Item detail"),
        (status = 404, description = "Item not found")
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadItems, &Resource::System))?;
    let item = state.items.get_item(id).await?;
    Ok(ok(item))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemInput,
    responses(
        (status = 201, description = "Item created"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Requires staff role")
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(input): Json<CreateItemInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageItems, &Resource::System))?;
    let item = state.items.create_item(input).await?;
    Ok(created(item))
}

#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    request_body = UpdateItemInput,
    responses(
        (status = 200, description = "Item updated"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Item not found")
    ),
    tag = "items"
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageItems, &Resource::System))?;
    let item = state.items.update_item(id, input).await?;
    Ok(ok(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found")
    ),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageItems, &Resource::System))?;
    state.items.delete_item(id).await?;
    Ok(no_content())
}

#[utoipa::path(
    get,
    path = "/api/v1/items/categories",
    responses((status = 200, description = "Distinct category values")),
    tag = "items"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadItems, &Resource::System))?;
    let categories = state.items.list_categories().await?;
    Ok(ok(categories))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/locations",
    responses((status = 200, description = "Distinct location values")),
    tag = "items"
)]
pub async fn list_locations(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadItems, &Resource::System))?;
    let locations = state.items.list_locations().await?;
    Ok(ok(locations))
}
