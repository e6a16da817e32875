//! User administration endpoints. Admin only, except `me`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, no_content, ok};
use crate::models::Role;
use crate::services::users::{CreateUserInput, UpdateUserInput};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "The caller's identity and role")),
    tag = "users"
)]
pub async fn me(user: AuthenticatedUser) -> Result<Response, ServiceError> {
    Ok(ok(MeResponse {
        user_id: user.user_id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users"),
        (status = 403, description = "Admin only")
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageUsers, &Resource::System))?;
    let users = state.users.list_users().await?;
    Ok(ok(users))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created"),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(input): Json<CreateUserInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageUsers, &Resource::System))?;
    let created_user = state.users.create_user(input).await?;
    Ok(created(created_user))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    responses(
        (status = 200, description = "User detail"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageUsers, &Resource::System))?;
    let found = state.users.get_user(id).await?;
    Ok(ok(found))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "User updated"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageUsers, &Resource::System))?;
    let updated = state.users.update_user(id, input).await?;
    Ok(ok(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ManageUsers, &Resource::System))?;
    state.users.delete_user(id).await?;
    Ok(no_content())
}
