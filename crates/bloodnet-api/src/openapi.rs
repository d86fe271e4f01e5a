//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "BloodNet API",
        version = "0.1.0",
        description = "Blood bank coordination: accounts, hospital inventory, donations and emergency requests."
    ),
    paths(
        // Auth
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::me,
        crate::routes::auth::update_profile,
        crate::routes::auth::change_password,
        crate::routes::auth::logout,
        // Users
        crate::routes::users::list_users,
        crate::routes::users::user_stats,
        crate::routes::users::list_hospitals,
        crate::routes::users::search_donors,
        crate::routes::users::donor_dashboard,
        crate::routes::users::get_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        // Inventory
        crate::routes::inventory::search_stock,
        crate::routes::inventory::list_stock,
        crate::routes::inventory::add_stock,
        crate::routes::inventory::stock_summary,
        crate::routes::inventory::low_stock_alerts,
        crate::routes::inventory::expiring_alerts,
        crate::routes::inventory::all_stock,
        crate::routes::inventory::get_item,
        crate::routes::inventory::update_item,
        crate::routes::inventory::remove_item,
        // Donations
        crate::routes::donations::create_donation,
        crate::routes::donations::list_donations,
        crate::routes::donations::my_donations,
        crate::routes::donations::hospital_donations,
        crate::routes::donations::recent_donations,
        crate::routes::donations::donation_stats,
        crate::routes::donations::get_donation,
        crate::routes::donations::update_donation,
        crate::routes::donations::delete_donation,
        // Requests
        crate::routes::requests::create_request,
        crate::routes::requests::list_requests,
        crate::routes::requests::critical_requests,
        crate::routes::requests::request_stats,
        crate::routes::requests::my_requests,
        crate::routes::requests::get_request,
        crate::routes::requests::update_status,
        crate::routes::requests::cancel_request,
        crate::routes::requests::assign_request,
        crate::routes::requests::delete_request,
    ),
    components(schemas(
        // Envelope and error types
        crate::error::ErrorBody,
        crate::error::FieldError,
        crate::response::PageInfo,
        // Auth DTOs
        crate::routes::auth::RegisterRequest,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::UpdateProfileRequest,
        crate::routes::auth::ChangePasswordRequest,
        // User DTOs
        crate::routes::users::UpdateUserRequest,
        // Inventory DTOs
        crate::routes::inventory::AddStockRequest,
        crate::routes::inventory::UpdateStockRequest,
        // Donation DTOs
        crate::routes::donations::CreateDonationRequest,
        crate::routes::donations::UpdateDonationRequest,
        // Request DTOs
        crate::routes::requests::CreateRequestBody,
        crate::routes::requests::UpdateStatusRequest,
        crate::routes::requests::AssignRequestBody,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and self-service profile"),
        (name = "users", description = "User management, directories and the donor dashboard"),
        (name = "inventory", description = "Hospital blood stock ledger"),
        (name = "donations", description = "Donation recording and statistics"),
        (name = "requests", description = "Emergency blood request lifecycle"),
    )
)]
pub struct ApiDoc;

/// Adds the session-token security scheme to the OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Session token from /api/auth/login, or a service token.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Build the OpenAPI router.
///
/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI documentification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
