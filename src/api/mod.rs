//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All booking endpoints are mounted under `/api/v1`; `/health` sits at the
//! root. [`ApiDoc`] collects the OpenAPI description, served by Swagger UI
//! at `/swagger-ui` when the `swagger-ui` feature is enabled.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;

/// OpenAPI document for the gateway.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "marina-gateway",
        description = "Yacht booking admission and payment reconciliation"
    ),
    paths(
        handlers::bookings::create_booking,
        handlers::bookings::check_availability,
        handlers::bookings::get_booking,
        handlers::bookings::cancel_booking,
        handlers::payments::create_payment_intent,
        handlers::payments::confirm_payment,
        handlers::payments::payment_webhook,
        handlers::admin::list_bookings,
        handlers::admin::complete_booking,
        handlers::admin::settle_payment,
        handlers::system::health_handler,
    ),
    components(schemas(
        crate::domain::Booking,
        crate::domain::DateRange,
        crate::domain::Pricing,
        crate::domain::BookingState,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::service::PaymentIntentDetails,
        crate::service::WebhookAck,
        dto::CreateBookingRequest,
        dto::AvailabilityResponse,
        dto::BookingListResponse,
        dto::PaginationMeta,
        dto::ConfirmPaymentRequest,
        dto::SettlePaymentRequest,
        dto::SettlementOutcome,
        dto::WebhookAckResponse,
        handlers::system::HealthResponse,
    )),
    modifiers(&AdminTokenScheme),
    tags(
        (name = "Bookings", description = "Booking admission and lifecycle"),
        (name = "Payments", description = "Card payments and gateway webhooks"),
        (name = "Admin", description = "Operator actions; bearer token required"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct AdminTokenScheme;

impl Modify for AdminTokenScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
