//! Administrative handlers. Every route requires the admin bearer token.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BookingListQuery, BookingListResponse, PaginationMeta, SettlePaymentRequest, clamp_page,
};
use crate::api::extract::{AdminGuard, ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::domain::{Booking, BookingFilter, BookingId, PageRequest};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /admin/bookings`: List bookings.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a valid admin token.
#[utoipa::path(
    get,
    path = "/api/v1/admin/bookings",
    tag = "Admin",
    summary = "List bookings",
    description = "Paginated booking list, newest first, optionally filtered by yacht and status.",
    params(BookingListQuery),
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Paginated booking list", body = BookingListResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
    )
)]
pub async fn list_bookings(
    _admin: AdminGuard,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let filter = BookingFilter {
        yacht_id: query.yacht_id,
        status: query.status,
    };
    let (page, per_page) = clamp_page(query.page, query.per_page);
    let listed = state
        .bookings
        .list_bookings(&filter, PageRequest::for_page(page, per_page))
        .await?;
    Ok(Json(BookingListResponse {
        data: listed.bookings,
        pagination: PaginationMeta::new(page, per_page, listed.total),
    }))
}

/// `POST /admin/bookings/{id}/complete`: Mark a charter completed.
///
/// # Errors
///
/// Returns [`GatewayError::IllegalTransition`] unless the booking is confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/admin/bookings/{id}/complete",
    tag = "Admin",
    summary = "Complete booking",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Completed booking", body = Booking),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking is not confirmed", body = ErrorResponse),
    )
)]
pub async fn complete_booking(
    _admin: AdminGuard,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.bookings.complete_booking(id).await?))
}

/// `POST /admin/bookings/{id}/settle`: Settle a crypto payment.
///
/// # Errors
///
/// Returns [`GatewayError`] for card bookings or payments already settled.
#[utoipa::path(
    post,
    path = "/api/v1/admin/bookings/{id}/settle",
    tag = "Admin",
    summary = "Settle crypto payment",
    description = "Records the administrator's verdict on a crypto transfer: paid confirms the booking, rejected cancels it.",
    params(("id" = uuid::Uuid, Path, description = "Booking ID")),
    request_body = SettlePaymentRequest,
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Settled booking", body = Booking),
        (status = 400, description = "Card booking or missing reference", body = ErrorResponse),
        (status = 401, description = "Missing or wrong admin token", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Payment already settled", body = ErrorResponse),
    )
)]
pub async fn settle_payment(
    _admin: AdminGuard,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(req): ApiJson<SettlePaymentRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let booking = state
        .bookings
        .settle_crypto_payment(id, req.into())
        .await?;
    Ok(Json(booking))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/bookings", get(list_bookings))
        .route("/admin/bookings/{id}/complete", post(complete_booking))
        .route("/admin/bookings/{id}/settle", post(settle_payment))
}
