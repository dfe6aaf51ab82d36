//! OpenAPI documentation configuration.
//!
//! Rendered with Scalar at `/docs`. The webhook endpoint is included even
//! though it lives outside `/api/v1`, so the whole inbound surface is
//! documented in one place.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

/// Trusted-gateway identity header security scheme.
struct GatewayAuthAddon;

impl Modify for GatewayAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Shiftctl-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-shiftctl-user",
                    "Authenticated email forwarded by the trusted gateway",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "shiftctl API",
        description = "Shift marketplace booking and settlement service"
    ),
    servers(
        (url = "/api/v1", description = "Marketplace API")
    ),
    modifiers(&GatewayAuthAddon),
    paths(
        api::handlers::shifts::create_shift,
        api::handlers::shifts::list_shifts,
        api::handlers::shifts::get_shift,
        api::handlers::shifts::cancel_shift,
        api::handlers::shifts::complete_shift,
        api::handlers::applications::submit_application,
        api::handlers::applications::list_shift_applications,
        api::handlers::applications::list_my_applications,
        api::handlers::applications::accept_application,
        api::handlers::applications::reject_application,
        api::handlers::applications::withdraw_application,
        api::handlers::bookings::list_bookings,
        api::handlers::bookings::get_booking,
        api::handlers::bookings::check_in,
        api::handlers::bookings::check_out,
        api::handlers::bookings::cancel_booking,
        api::handlers::bookings::dispute_booking,
        api::handlers::bookings::settle_booking,
        api::handlers::users::get_current_user,
        api::handlers::users::update_payout_account,
        api::handlers::webhooks::payments_webhook,
    ),
    components(
        schemas(
            api::models::shifts::ShiftCreate,
            api::models::shifts::ShiftResponse,
            api::models::applications::ApplicationCreate,
            api::models::applications::ApplicationResponse,
            api::models::applications::AcceptResponse,
            api::models::bookings::BookingResponse,
            api::models::users::UserResponse,
            api::models::users::PayoutAccountUpdate,
            crate::db::models::shifts::ShiftStatus,
            crate::db::models::applications::ApplicationStatus,
            crate::db::models::bookings::BookingStatus,
            crate::db::models::users::UserRole,
        )
    ),
    tags(
        (name = "shifts", description = "Shift posting and lifecycle"),
        (name = "applications", description = "Provider applications"),
        (name = "bookings", description = "Work tracking and settlement"),
        (name = "users", description = "Caller profile"),
        (name = "webhooks", description = "Inbound processor events"),
    )
)]
pub struct ApiDoc;
