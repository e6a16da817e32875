//! Image analysis endpoints.
//!
//! The upload is a single multipart field named `image`. The router's
//! body limit and the service's own size check both enforce the upload
//! cap, so an oversized file is rejected before it reaches the backend.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::Response;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{accepted, no_content, ok};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/items/analyse",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Analysis dispatched, task id returned"),
        (status = 400, description = "Missing or oversized image"),
        (status = 403, description = "Requires staff role"),
        (status = 502, description = "Analysis backend unavailable")
    ),
    tag = "tasks"
)]
pub async fn analyse_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::AnalyzeImage, &Resource::System))?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("Malformed multipart body: {}", e)))?
        .ok_or_else(|| ServiceError::InvalidInput("Missing image field".to_string()))?;

    if field.name() != Some("image") {
        return Err(ServiceError::InvalidInput(
            "Expected a single field named 'image'".to_string(),
        ));
    }
    let filename = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("Failed to read upload: {}", e)))?
        .to_vec();

    let owner = user.user_id.to_string();
    let view = state
        .analysis
        .start_analysis(&owner, filename, content_type, bytes)
        .await?;
    Ok(accepted(view))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/status",
    responses(
        (status = 200, description = "Latest observed task state"),
        (status = 404, description = "Unknown task")
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::AnalyzeImage, &Resource::System))?;
    let view = state.analysis.get_task(&id)?;
    Ok(ok(view))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    responses(
        (status = 204, description = "Polling stopped"),
        (status = 404, description = "Unknown task")
    ),
    tag = "tasks"
)]
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::AnalyzeImage, &Resource::System))?;
    state.analysis.cancel_task(&id)?;
    Ok(no_content())
}
