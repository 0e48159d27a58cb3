//! DTOs for booking endpoints.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{PaginationMeta, default_page, default_per_page};
use crate::domain::{Booking, BookingStatus, DateRange, PaymentMethod, UserId, YachtId};
use crate::error::GatewayError;
use crate::service::AdmissionRequest;

/// Request body for `POST /bookings`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingRequest {
    /// Yacht to reserve.
    pub yacht_id: YachtId,
    /// First night (`YYYY-MM-DD`).
    pub start_date: NaiveDate,
    /// Checkout day, exclusive.
    pub end_date: NaiveDate,
    /// Guests aboard.
    pub guest_count: u32,
    /// `card` or `crypto`.
    pub payment_method: PaymentMethod,
}

impl CreateBookingRequest {
    /// Converts the body into an admission request for `caller`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] unless `start_date < end_date`.
    pub fn into_admission(self, caller: Option<UserId>) -> Result<AdmissionRequest, GatewayError> {
        let date_range = DateRange::new(self.start_date, self.end_date)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        Ok(AdmissionRequest {
            yacht_id: self.yacht_id,
            date_range,
            guest_count: self.guest_count,
            payment_method: self.payment_method,
            guest_id: caller,
        })
    }
}

/// Query for `GET /yachts/{id}/availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct AvailabilityQuery {
    /// First night (`YYYY-MM-DD`).
    pub start: NaiveDate,
    /// Checkout day, exclusive.
    pub end: NaiveDate,
}

impl AvailabilityQuery {
    /// Returns the queried range.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] unless `start < end`.
    pub fn range(&self) -> Result<DateRange, GatewayError> {
        DateRange::new(self.start, self.end).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
    }
}

/// Response of `GET /yachts/{id}/availability`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    /// Queried yacht.
    pub yacht_id: YachtId,
    /// Queried range.
    pub date_range: DateRange,
    /// `true` when no active booking overlaps.
    pub available: bool,
    /// Ranges of overlapping bookings.
    pub conflicts: Vec<DateRange>,
}

/// Query for `GET /admin/bookings`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(deny_unknown_fields)]
pub struct BookingListQuery {
    /// Only bookings of this yacht.
    #[param(value_type = Option<uuid::Uuid>)]
    pub yacht_id: Option<YachtId>,
    /// Only bookings in this status.
    #[param(value_type = Option<String>)]
    pub status: Option<BookingStatus>,
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Paginated booking list.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingListResponse {
    /// Bookings on this page, newest first.
    pub data: Vec<Booking>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_fields() {
        let body = serde_json::json!({
            "yacht_id": uuid::Uuid::new_v4(),
            "start_date": "2024-07-01",
            "end_date": "2024-07-04",
            "guest_count": 2,
            "payment_method": "card",
            "discount": "FRIENDS"
        });
        assert!(serde_json::from_value::<CreateBookingRequest>(body).is_err());
    }

    #[test]
    fn inverted_range_is_invalid_request() {
        let body = serde_json::json!({
            "yacht_id": uuid::Uuid::new_v4(),
            "start_date": "2024-07-04",
            "end_date": "2024-07-01",
            "guest_count": 2,
            "payment_method": "crypto"
        });
        let Ok(request) = serde_json::from_value::<CreateBookingRequest>(body) else {
            panic!("body should parse");
        };
        assert!(matches!(
            request.into_admission(None),
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
