//! Guest request endpoints.
//!
//! These routes are unauthenticated: a guest submits contact details plus
//! item lines, receives a confirmation token by email, and confirms with
//! that token to move their requests into the reviewable pool. The token
//! is returned in the response body here because the mail relay lives
//! outside this service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, ok};
use crate::services::guests::GuestContactInput;
use crate::services::requests::{CreateRequestInput, RequestDetail};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GuestRequestBody {
    #[validate]
    pub contact: GuestContactInput,
    #[validate]
    pub request: CreateRequestInput,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GuestRequestResponse {
    pub guest_id: Uuid,
    pub request: RequestDetail,
    /// Confirmation token, normally delivered by email.
    pub confirmation_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmGuestBody {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmGuestResponse {
    pub guest_id: Uuid,
    pub confirmed_requests: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/guests/requests",
    request_body = GuestRequestBody,
    responses(
        (status = 201, description = "Unconfirmed request created, token issued"),
        (status = 400, description = "Validation failed")
    ),
    tag = "guests"
)]
pub async fn submit_guest_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GuestRequestBody>,
) -> Result<Response, ServiceError> {
    body.validate()?;

    let registration = state.guests.register_guest(body.contact).await?;
    let detail = state
        .requests
        .create_guest_request(registration.guest.id, body.request)
        .await?;

    Ok(created(GuestRequestResponse {
        guest_id: registration.guest.id,
        request: detail,
        confirmation_token: registration.token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/guests/{id}/confirm",
    request_body = ConfirmGuestBody,
    responses(
        (status = 200, description = "Guest confirmed, unconfirmed requests now pending"),
        (status = 401, description = "Wrong or expired token"),
        (status = 404, description = "Guest not found")
    ),
    tag = "guests"
)]
pub async fn confirm_guest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ConfirmGuestBody>,
) -> Result<Response, ServiceError> {
    let guest = state.guests.confirm_guest(id, &body.token).await?;
    let confirmed = state.requests.confirm_guest_requests(guest.id).await?;

    Ok(ok(ConfirmGuestResponse {
        guest_id: guest.id,
        confirmed_requests: confirmed,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/guests/{id}",
    responses(
        (status = 200, description = "Guest record"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Guest not found")
    ),
    tag = "guests"
)]
pub async fn get_guest(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadGuests, &Resource::System))?;
    let guest = state.guests.get_guest(id).await?;
    Ok(ok(guest))
}
