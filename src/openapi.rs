//! OpenAPI document and Swagger UI wiring.

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::items::list_items,
        crate::handlers::items::get_item,
        crate::handlers::items::create_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::items::list_categories,
        crate::handlers::items::list_locations,
        crate::handlers::requests::create_request,
        crate::handlers::requests::list_requests,
        crate::handlers::requests::get_request,
        crate::handlers::requests::approve_request,
        crate::handlers::requests::reject_request,
        crate::handlers::requests::return_request,
        crate::handlers::requests::update_request,
        crate::handlers::requests::delete_request,
        crate::handlers::guests::submit_guest_request,
        crate::handlers::guests::confirm_guest,
        crate::handlers::guests::get_guest,
        crate::handlers::tasks::analyse_item,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::cancel_task,
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::set_cart_quantity,
        crate::handlers::cart::remove_from_cart,
        crate::handlers::cart::clear_cart,
        crate::handlers::users::me,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::dashboard::stats,
        crate::handlers::status::service_status,
        crate::handlers::status::health,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::Role,
        crate::models::RequestStatus,
        crate::models::TaskStatus,
        crate::models::ItemAnalysis,
        crate::services::items::CreateItemInput,
        crate::services::items::UpdateItemInput,
        crate::services::requests::CreateRequestInput,
        crate::services::requests::UpdateRequestInput,
        crate::services::requests::RequestLineInput,
        crate::services::requests::RequestLineDetail,
        crate::services::guests::GuestContactInput,
        crate::services::users::CreateUserInput,
        crate::services::users::UpdateUserInput,
        crate::services::cart::CartLine,
        crate::services::analysis::TaskView,
        crate::services::dashboard::DashboardStats,
        crate::handlers::guests::GuestRequestBody,
        crate::handlers::guests::GuestRequestResponse,
        crate::handlers::guests::ConfirmGuestBody,
        crate::handlers::guests::ConfirmGuestResponse,
        crate::handlers::cart::AddCartLineBody,
        crate::handlers::cart::SetQuantityBody,
        crate::handlers::users::MeResponse,
    )),
    tags(
        (name = "items", description = "Inventory items"),
        (name = "requests", description = "Checkout requests"),
        (name = "guests", description = "Guest submissions"),
        (name = "tasks", description = "Image analysis tasks"),
        (name = "cart", description = "Draft carts"),
        (name = "users", description = "User administration"),
        (name = "dashboard", description = "Aggregate stats"),
        (name = "status", description = "Liveness and readiness"),
    ),
    info(
        title = "Stockroom API",
        description = "Studio inventory and checkout request service"
    )
)]
pub struct ApiDoc;

pub fn swagger_routes() -> Router<Arc<AppState>> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
