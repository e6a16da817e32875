//! Draft cart endpoints.
//!
//! Carts are keyed by the caller's user id, so each session of work on a
//! request draft stays private to its owner. Lines snapshot the item's
//! name, level and availability at add time.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{no_content, ok};
use crate::services::cart::CartLine;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartLineBody {
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetQuantityBody {
    pub quantity: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "The caller's cart lines")),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    Ok(ok(state.cart.lines(&user.user_id.to_string())))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddCartLineBody,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Item not found")
    ),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(body): Json<AddCartLineBody>,
) -> Result<Response, ServiceError> {
    body.validate()?;

    let item = state.items.get_item(body.item_id).await?;
    let line = CartLine {
        item_id: item.id,
        item_name: item.name.clone(),
        item_level: crate::models::Role::item_level_or_closed(Some(&item.level)),
        quantity: body.quantity,
        available: item.available,
    };
    let cart = state.cart.add_line(&user.user_id.to_string(), line);
    Ok(ok(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    request_body = SetQuantityBody,
    responses(
        (status = 200, description = "Updated cart; quantity clamped to availability"),
        (status = 404, description = "Item is not in the cart")
    ),
    tag = "cart"
)]
pub async fn set_cart_quantity(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<SetQuantityBody>,
) -> Result<Response, ServiceError> {
    let cart = state
        .cart
        .set_quantity(&user.user_id.to_string(), item_id, body.quantity)?;
    Ok(ok(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    responses((status = 200, description = "Updated cart")),
    tag = "cart"
)]
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let cart = state.cart.remove_line(&user.user_id.to_string(), item_id);
    Ok(ok(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 204, description = "Cart emptied")),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    state.cart.clear(&user.user_id.to_string());
    Ok(no_content())
}
