//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Domain
//! errors convert into it, and each variant maps to a specific HTTP status
//! code and structured JSON error response. Callers can tell "pick other
//! dates" (`Unavailable`) from "retry later" (`GatewayUnreachable`) from
//! "refetch, your view is stale" (`IllegalTransition`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{BookingId, DateRange, PricingError, StoreError, TransitionError, YachtId};
use crate::payment::{PaymentGatewayError, WebhookError};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2003,
///     "message": "yacht unavailable for the requested dates",
///     "details": { "conflicts": [{ "start": "2024-07-01", "end": "2024-07-04" }] }
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                     |
/// |-----------|-----------------------|---------------------------------|
/// | 1000–1999 | Validation / auth     | 400 Bad Request / 401           |
/// | 2000–2999 | State / Not Found     | 404 Not Found / 409 Conflict    |
/// | 3000–3999 | Server / upstream     | 500 / 502 / 503                 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The stored yacht rate or requested range cannot be priced.
    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Webhook signature check failed; the event was not processed.
    #[error("unverified gateway event: {0}")]
    GatewayUnverified(#[from] WebhookError),

    /// Missing or wrong administrator credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Booking with the given ID was not found.
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Yacht with the given ID was not found.
    #[error("yacht not found: {0}")]
    YachtNotFound(YachtId),

    /// Requested dates overlap active bookings.
    #[error("yacht unavailable for the requested dates")]
    Unavailable {
        /// Ranges of the bookings in the way, sorted by start.
        conflicts: Vec<DateRange>,
    },

    /// The state machine rejected the action; the caller's view is stale.
    #[error("illegal transition: {0}")]
    IllegalTransition(TransitionError),

    /// Payment gateway did not answer; nothing was changed.
    #[error("payment gateway unreachable: {0}")]
    GatewayUnreachable(String),

    /// Payment gateway refused the request.
    #[error("payment gateway rejected request: {0}")]
    PaymentRejected(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Pricing(_) => 1002,
            Self::GatewayUnverified(_) => 1003,
            Self::Unauthorized => 1004,
            Self::BookingNotFound(_) => 2001,
            Self::YachtNotFound(_) => 2002,
            Self::Unavailable { .. } => 2003,
            Self::IllegalTransition(_) => 2004,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::GatewayUnreachable(_) => 3002,
            Self::PaymentRejected(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Pricing(_) | Self::GatewayUnverified(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BookingNotFound(_) | Self::YachtNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable { .. } | Self::IllegalTransition(_) => StatusCode::CONFLICT,
            Self::GatewayUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PaymentRejected(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Unavailable { conflicts } => Some(serde_json::json!({ "conflicts": conflicts })),
            Self::IllegalTransition(TransitionError::Illegal { action, state, .. }) => {
                Some(serde_json::json!({ "action": action.as_str(), "state": state }))
            }
            _ => None,
        }
    }
}

impl From<TransitionError> for GatewayError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::MissingReference => Self::InvalidRequest(err.to_string()),
            TransitionError::Illegal { .. } => Self::IllegalTransition(err),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<PaymentGatewayError> for GatewayError {
    fn from(err: PaymentGatewayError) -> Self {
        match err {
            PaymentGatewayError::Unreachable(msg) => Self::GatewayUnreachable(msg),
            PaymentGatewayError::NotFound(reference) => {
                Self::InvalidRequest(format!("unknown payment reference: {reference}"))
            }
            PaymentGatewayError::Rejected(msg) => Self::PaymentRejected(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::{BookingAction, BookingState, BookingStatus, PaymentStatus};

    #[test]
    fn unavailable_maps_to_conflict_with_ranges() {
        let (Some(s), Some(e)) = (
            NaiveDate::from_ymd_opt(2024, 7, 1),
            NaiveDate::from_ymd_opt(2024, 7, 4),
        ) else {
            panic!("invalid dates");
        };
        let Ok(range) = DateRange::new(s, e) else {
            panic!("invalid range");
        };
        let err = GatewayError::Unavailable {
            conflicts: vec![range],
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let Some(details) = err.details() else {
            panic!("expected details");
        };
        assert_eq!(details["conflicts"][0]["start"], "2024-07-01");
        assert_eq!(details["conflicts"][0]["end"], "2024-07-04");
    }

    #[test]
    fn transition_errors_split_by_kind() {
        let illegal = GatewayError::from(TransitionError::Illegal {
            booking_id: BookingId::new(),
            action: BookingAction::Cancel,
            state: BookingState {
                status: BookingStatus::Completed,
                payment_status: PaymentStatus::Paid,
            },
        });
        assert_eq!(illegal.status_code(), StatusCode::CONFLICT);
        assert_eq!(illegal.error_code(), 2004);

        let missing = GatewayError::from(TransitionError::MissingReference);
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gateway_errors_distinguish_retryable() {
        let down = GatewayError::from(PaymentGatewayError::Unreachable("timeout".to_string()));
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = GatewayError::from(PaymentGatewayError::NotFound("pi_x".to_string()));
        assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
    }
}
