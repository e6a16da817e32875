//! Dashboard stats endpoint. Staff and above.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;

use crate::auth::capability::{authorize, can, Action, Resource};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::ok;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Aggregate counts"),
        (status = 403, description = "Requires staff role")
    ),
    tag = "dashboard"
)]
pub async fn stats(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    authorize(can(&user.0, Action::ReadDashboard, &Resource::System))?;
    let stats = state.dashboard.stats().await?;
    Ok(ok(stats))
}
