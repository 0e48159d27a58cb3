//! Payment handlers: intent creation, client confirmation, gateway webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{ConfirmPaymentRequest, WebhookAckResponse};
use crate::api::extract::{ApiJson, ApiPath};
use crate::app_state::AppState;
use crate::domain::{Booking, BookingId};
use crate::error::{ErrorResponse, GatewayError};
use crate::payment::SIGNATURE_HEADER;
use crate::service::PaymentIntentDetails;

/// `POST /bookings/{id}/payment-intent`: Open a card payment.
///
/// # Errors
///
/// Returns [`GatewayError`] for crypto or settled bookings and gateway failures.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/payment-intent",
    tag = "Payments",
    summary = "Create payment intent",
    description = "Creates (or returns the existing) card payment intent for the booking total.",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Payment intent", body = PaymentIntentDetails),
        (status = 400, description = "Not a card booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking is no longer awaiting payment", body = ErrorResponse),
        (status = 503, description = "Payment gateway unreachable", body = ErrorResponse),
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.reconciliation.create_payment_intent(id).await?))
}

/// `POST /bookings/{id}/confirm-payment`: Client reports a completed payment.
///
/// # Errors
///
/// Returns [`GatewayError`] for a foreign reference or an unreachable gateway.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/confirm-payment",
    tag = "Payments",
    summary = "Confirm payment",
    description = "Card: re-checks the intent with the gateway and applies its outcome. Crypto: records the transfer reference; the booking stays pending until an administrator settles it.",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Booking after reconciliation", body = Booking),
        (status = 400, description = "Reference invalid for this booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Outcome no longer applies", body = ErrorResponse),
        (status = 503, description = "Payment gateway unreachable; retry", body = ErrorResponse),
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(req): ApiJson<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let booking = state
        .reconciliation
        .on_client_confirm(id, &req.reference)
        .await?;
    Ok(Json(booking))
}

/// `POST /payments/webhook`: Gateway event delivery.
///
/// # Errors
///
/// Returns [`GatewayError::GatewayUnverified`] for bad signatures and
/// [`GatewayError::PersistenceError`] so the gateway redelivers.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    tag = "Payments",
    summary = "Payment gateway webhook",
    description = "Verifies the Payment-Signature header over the raw body and reconciles the payment. Duplicate, orphaned and inapplicable events are acknowledged with 200.",
    request_body(content = String, content_type = "application/json"),
    params(("Payment-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac-sha256>")),
    responses(
        (status = 200, description = "Delivery accepted", body = WebhookAckResponse),
        (status = 400, description = "Signature missing or invalid", body = ErrorResponse),
        (status = 500, description = "Storage failure; redeliver", body = ErrorResponse),
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state.reconciliation.on_gateway_event(&body, signature).await?;
    Ok(Json(WebhookAckResponse {
        received: true,
        outcome,
    }))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/{id}/payment-intent", post(create_payment_intent))
        .route("/bookings/{id}/confirm-payment", post(confirm_payment))
        .route("/payments/webhook", post(payment_webhook))
}
