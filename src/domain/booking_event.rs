//! Domain events reflecting booking state changes.
//!
//! Every successful mutation emits a [`BookingEvent`] through the
//! [`super::EventBus`]. The audit recorder persists them to the
//! `booking_events` table.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BookingId, BookingState, DateRange, PaymentMethod, YachtId};

/// Who or what triggered a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The guest cancelled.
    Guest,
    /// The gateway reported a failed payment.
    PaymentFailed,
    /// An administrator rejected a crypto payment.
    PaymentRejected,
    /// The pending-booking sweeper expired the reservation.
    Expired,
}

/// Domain event emitted after every booking mutation.
///
/// Monetary amounts are strings to keep decimal precision intact in JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// A booking request was admitted.
    BookingCreated {
        /// Booking identifier.
        booking_id: BookingId,
        /// Reserved yacht.
        yacht_id: YachtId,
        /// Reserved nights.
        date_range: DateRange,
        /// Chosen payment method.
        payment_method: PaymentMethod,
        /// Total price.
        total: String,
        /// Admission timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Payment was confirmed and the booking became `confirmed/paid`.
    PaymentConfirmed {
        /// Booking identifier.
        booking_id: BookingId,
        /// Yacht of the booking.
        yacht_id: YachtId,
        /// Gateway transaction reference or settlement reference.
        reference: String,
        /// Confirmation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A crypto transfer was reported by the guest, pending settlement.
    PaymentClaimed {
        /// Booking identifier.
        booking_id: BookingId,
        /// Yacht of the booking.
        yacht_id: YachtId,
        /// Reference reported by the guest.
        reference: String,
        /// Report timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The payment failed.
    PaymentFailed {
        /// Booking identifier.
        booking_id: BookingId,
        /// Yacht of the booking.
        yacht_id: YachtId,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The booking was cancelled.
    BookingCancelled {
        /// Booking identifier.
        booking_id: BookingId,
        /// Yacht of the booking.
        yacht_id: YachtId,
        /// Released nights.
        date_range: DateRange,
        /// Cancellation trigger.
        reason: CancelReason,
        /// State after the cancellation.
        state: BookingState,
        /// Cancellation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The charter was marked completed.
    BookingCompleted {
        /// Booking identifier.
        booking_id: BookingId,
        /// Yacht of the booking.
        yacht_id: YachtId,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl BookingEvent {
    /// Returns the booking ID associated with this event.
    #[must_use]
    pub fn booking_id(&self) -> BookingId {
        match self {
            Self::BookingCreated { booking_id, .. }
            | Self::PaymentConfirmed { booking_id, .. }
            | Self::PaymentClaimed { booking_id, .. }
            | Self::PaymentFailed { booking_id, .. }
            | Self::BookingCancelled { booking_id, .. }
            | Self::BookingCompleted { booking_id, .. } => *booking_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => "booking_created",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::PaymentClaimed { .. } => "payment_claimed",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::BookingCancelled { .. } => "booking_cancelled",
            Self::BookingCompleted { .. } => "booking_completed",
        }
    }
}
