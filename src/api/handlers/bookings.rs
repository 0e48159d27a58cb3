//! Booking handlers: request, availability, lookup, cancellation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AvailabilityQuery, AvailabilityResponse, CreateBookingRequest};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, CallerIdentity};
use crate::app_state::AppState;
use crate::domain::{Booking, BookingId, YachtId};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /bookings`: Request a booking.
///
/// # Errors
///
/// Returns [`GatewayError`] on validation failure or when the dates are taken.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "Request a booking",
    description = "Admits a booking for the yacht and nights if no active booking overlaps. The booking starts as pending/pending with its price fixed.",
    request_body = CreateBookingRequest,
    params(("X-User-Id" = Option<String>, Header, description = "Caller identity; omit for guest checkout")),
    responses(
        (status = 201, description = "Booking admitted", body = Booking),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Yacht not found", body = ErrorResponse),
        (status = 409, description = "Dates unavailable; details list the conflicts", body = ErrorResponse),
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let request = req.into_admission(caller)?;
    let booking = state.admission.admit(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// `GET /yachts/{id}/availability`: Check whether nights are free.
///
/// # Errors
///
/// Returns [`GatewayError`] for an invalid range or unknown yacht.
#[utoipa::path(
    get,
    path = "/api/v1/yachts/{id}/availability",
    tag = "Bookings",
    summary = "Check availability",
    description = "Reports whether the half-open range [start, end) is free. The answer is advisory: only admission reserves dates.",
    params(
        ("id" = uuid::Uuid, Path, description = "Yacht ID"),
        AvailabilityQuery,
    ),
    responses(
        (status = 200, description = "Availability", body = AvailabilityResponse),
        (status = 400, description = "Invalid range", body = ErrorResponse),
        (status = 404, description = "Yacht not found", body = ErrorResponse),
    )
)]
pub async fn check_availability(
    State(state): State<AppState>,
    ApiPath(yacht_id): ApiPath<YachtId>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let range = query.range()?;
    let availability = state.admission.check_availability(yacht_id, &range).await?;
    Ok(Json(AvailabilityResponse {
        yacht_id,
        date_range: range,
        available: availability.available,
        conflicts: availability.conflicts,
    }))
}

/// `GET /bookings/{id}`: Get a booking.
///
/// # Errors
///
/// Returns [`GatewayError::BookingNotFound`] if it does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    summary = "Get booking",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking", body = Booking),
        (status = 404, description = "Booking not found", body = ErrorResponse),
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.bookings.get_booking(id).await?))
}

/// `POST /bookings/{id}/cancel`: Cancel a booking.
///
/// # Errors
///
/// Returns [`GatewayError::IllegalTransition`] for cancelled or completed bookings.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    tag = "Bookings",
    summary = "Cancel booking",
    description = "Cancels a pending or confirmed booking and frees its dates. A captured payment is marked refunded.",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Cancelled booking", body = Booking),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking can no longer be cancelled", body = ErrorResponse),
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.bookings.cancel_booking(id).await?))
}

/// Booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/yachts/{id}/availability", get(check_availability))
}
