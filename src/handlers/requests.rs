//! Checkout request endpoints.
//!
//! Non-admin callers only see their own requests; reviewing, returning,
//! editing and deleting are admin operations. Creation runs the
//! auto-approval check inside the service.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, no_content, ok, PaginatedResponse, PaginationParams};
use crate::services::requests::{CreateRequestInput, RequestFilter, UpdateRequestInput};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/requests",
    request_body = CreateRequestInput,
    responses(
        (status = 201, description = "Request created; status reflects the auto-approval outcome"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "A referenced item does not exist")
    ),
    tag = "requests"
)]
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(input): Json<CreateRequestInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::CreateRequest, &Resource::System))?;
    let detail = state.requests.create_request(&user.0, input).await?;
    Ok(created(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests",
    params(PaginationParams),
    responses((status = 200, description = "Requests visible to the caller")),
    tag = "requests"
)]
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<RequestFilter>,
) -> Result<Response, ServiceError> {
    if can(&user.0, Action::ListAllRequests, &Resource::System) {
        let (rows, total) = state
            .requests
            .list_requests(filter, pagination.page(), pagination.per_page())
            .await?;
        return Ok(ok(PaginatedResponse::new(
            rows,
            pagination.page(),
            pagination.per_page(),
            total,
        )));
    }

    // Everyone else sees only their own requests, filters ignored.
    let rows = state.requests.list_for_user(user.user_id).await?;
    let total = rows.len() as u64;
    Ok(ok(PaginatedResponse::new(rows, 1, total.max(1), total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    responses(
        (status = 200, description = "Request with item lines"),
        (status = 403, description = "Not the owner and not an admin"),
        (status = 404, description = "Request not found")
    ),
    tag = "requests"
)]
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.requests.get_request(id).await?;
    authorize(can(
        &user.0,
        Action::ReadRequest,
        &Resource::Request {
            owner: detail.request.user_id,
        },
    ))?;
    Ok(ok(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/approve",
    responses(
        (status = 200, description = "Request approved"),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Admin only")
    ),
    tag = "requests"
)]
pub async fn approve_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReviewRequest, &Resource::System))?;
    let detail = state.requests.approve_request(id).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/reject",
    responses(
        (status = 200, description = "Request rejected"),
        (status = 400, description = "Request is not pending"),
        (status = 403, description = "Admin only")
    ),
    tag = "requests"
)]
pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReviewRequest, &Resource::System))?;
    let detail = state.requests.reject_request(id).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/return",
    responses(
        (status = 200, description = "Request marked returned"),
        (status = 400, description = "Request is not approved or overdue"),
        (status = 403, description = "Admin only")
    ),
    tag = "requests"
)]
pub async fn return_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReturnRequest, &Resource::System))?;
    let detail = state.requests.mark_returned(id).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/requests/{id}",
    request_body = UpdateRequestInput,
    responses(
        (status = 200, description = "Request updated"),
        (status = 400, description = "Request is no longer pending"),
        (status = 403, description = "Admin only")
    ),
    tag = "requests"
)]
pub async fn update_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRequestInput>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::EditRequest, &Resource::System))?;
    let detail = state.requests.update_request(id, input).await?;
    Ok(ok(detail))
}

#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}",
    responses(
        (status = 204, description = "Request deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Request not found")
    ),
    tag = "requests"
)]
pub async fn delete_request(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::DeleteRequest, &Resource::System))?;
    state.requests.delete_request(id).await?;
    Ok(no_content())
}
