//! Booking aggregate and its lifecycle state machine.
//!
//! A [`Booking`] carries two orthogonal state axes, [`BookingStatus`] and
//! [`PaymentStatus`]. Every transition method validates the current
//! [`BookingState`] first and only then mutates; a rejected transition
//! leaves the record byte-for-byte untouched, `updated_at` included.
//!
//! ```text
//! status:   pending ─▶ confirmed ─▶ completed
//!              │           │
//!              └──────┬────┘
//!                     ▼
//!                 cancelled
//!
//! payment:  pending ─▶ paid ─▶ refunded   (refund through cancel)
//!              │                  ▲
//!              │                  └─ captured after the booking was cancelled
//!              └──▶ failed
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BookingId, DateRange, Pricing, UserId, YachtId};

/// How the guest pays for the charter. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the payment gateway.
    Card,
    /// Self-reported cryptocurrency transfer, settled manually.
    Crypto,
}

/// Reservation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Admitted, waiting for payment.
    Pending,
    /// Paid and holding the dates.
    Confirmed,
    /// Released by the guest, a failed payment, or expiry.
    Cancelled,
    /// Charter took place.
    Completed,
}

/// Payment status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No settled outcome yet.
    Pending,
    /// Funds captured.
    Paid,
    /// Payment attempt failed.
    Failed,
    /// Captured funds owed back after cancellation.
    Refunded,
}

/// Error returned when parsing a status string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl BookingStatus {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` for statuses that hold the yacht's dates.
    #[must_use]
    pub const fn blocks_availability(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(ParseStatusError {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

impl PaymentStatus {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Returns `true` once the gateway outcome has been settled.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(ParseStatusError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

impl PaymentMethod {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Crypto => "crypto",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "crypto" => Ok(Self::Crypto),
            other => Err(ParseStatusError {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

/// Combined `(status, payment_status)` pair.
///
/// Stores compare against this value to detect concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct BookingState {
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
}

impl fmt::Display for BookingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.status.as_str(), self.payment_status.as_str())
    }
}

/// Caller-visible transition names, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    /// Gateway or administrator confirmed the payment.
    ConfirmPayment,
    /// Gateway or administrator reported the payment as failed.
    FailPayment,
    /// Guest, sweeper or administrator cancelled.
    Cancel,
    /// Administrator marked the charter as completed.
    Complete,
    /// Guest reported a crypto transfer.
    ClaimPayment,
}

impl BookingAction {
    /// Returns the action as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm_payment",
            Self::FailPayment => "fail_payment",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
            Self::ClaimPayment => "claim_payment",
        }
    }
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The action is not allowed from the booking's current state.
    #[error("cannot {action} booking {booking_id} in state {state}")]
    Illegal {
        /// Booking the action targeted.
        booking_id: BookingId,
        /// Attempted action.
        action: BookingAction,
        /// State at the time of the attempt.
        state: BookingState,
    },

    /// A payment confirmation arrived without a gateway reference.
    #[error("payment reference must not be empty")]
    MissingReference,
}

/// A single yacht reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Booking {
    /// Unique booking identifier.
    pub id: BookingId,
    /// Reserved yacht.
    pub yacht_id: YachtId,
    /// Caller who made the request; `None` for guest checkout.
    pub guest_id: Option<UserId>,
    /// Reserved nights `[start, end)`.
    pub date_range: DateRange,
    /// Number of guests aboard.
    pub guest_count: u32,
    /// Price fixed at admission.
    pub pricing: Pricing,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Gateway transaction reference, written once on a successful payment.
    pub external_payment_ref: Option<String>,
    /// Transfer reference reported by the guest for a crypto payment.
    /// Informational only, never proof of payment.
    pub claimed_payment_ref: Option<String>,
    /// Admission timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last state change.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a freshly admitted booking in `pending/pending`.
    #[must_use]
    pub fn new(
        yacht_id: YachtId,
        guest_id: Option<UserId>,
        date_range: DateRange,
        guest_count: u32,
        pricing: Pricing,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookingId::new(),
            yacht_id,
            guest_id,
            date_range,
            guest_count,
            pricing,
            payment_method,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            external_payment_ref: None,
            claimed_payment_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the current `(status, payment_status)` pair.
    #[must_use]
    pub const fn state(&self) -> BookingState {
        BookingState {
            status: self.status,
            payment_status: self.payment_status,
        }
    }

    /// Returns `true` while the booking holds its dates.
    #[must_use]
    pub const fn blocks_availability(&self) -> bool {
        self.status.blocks_availability()
    }

    fn illegal(&self, action: BookingAction) -> TransitionError {
        TransitionError::Illegal {
            booking_id: self.id,
            action,
            state: self.state(),
        }
    }

    /// Records a successful payment: `pending/pending → confirmed/paid`.
    ///
    /// The reference is only stored if none was recorded before.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::MissingReference`] for a blank reference
    /// and [`TransitionError::Illegal`] unless the booking is `pending/pending`.
    pub fn confirm_payment(
        &mut self,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if reference.trim().is_empty() {
            return Err(TransitionError::MissingReference);
        }
        if self.status != BookingStatus::Pending || self.payment_status != PaymentStatus::Pending {
            return Err(self.illegal(BookingAction::ConfirmPayment));
        }

        self.status = BookingStatus::Confirmed;
        self.payment_status = PaymentStatus::Paid;
        if self.external_payment_ref.as_deref().is_none_or(str::is_empty) {
            self.external_payment_ref = Some(reference.to_string());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Records a failed payment: payment becomes `failed`, status `cancelled`.
    ///
    /// Also accepted for a booking the guest cancelled while the payment
    /// was still outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] unless the payment is pending
    /// and the status is `pending` or `cancelled`.
    pub fn record_payment_failure(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let allowed = self.payment_status == PaymentStatus::Pending
            && matches!(
                self.status,
                BookingStatus::Pending | BookingStatus::Cancelled
            );
        if !allowed {
            return Err(self.illegal(BookingAction::FailPayment));
        }

        self.payment_status = PaymentStatus::Failed;
        self.status = BookingStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Records a capture that arrived after the booking was cancelled.
    ///
    /// The funds are owed back, so the payment becomes `refunded` and later
    /// outcomes for the same payment find it settled.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::MissingReference`] for a blank reference
    /// and [`TransitionError::Illegal`] unless the booking is `cancelled/pending`.
    pub fn record_late_capture(
        &mut self,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if reference.trim().is_empty() {
            return Err(TransitionError::MissingReference);
        }
        if self.status != BookingStatus::Cancelled || self.payment_status != PaymentStatus::Pending
        {
            return Err(self.illegal(BookingAction::ConfirmPayment));
        }

        self.payment_status = PaymentStatus::Refunded;
        if self.external_payment_ref.as_deref().is_none_or(str::is_empty) {
            self.external_payment_ref = Some(reference.to_string());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Cancels a pending or confirmed booking, refunding a captured payment.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] for cancelled or completed bookings.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        ) {
            return Err(self.illegal(BookingAction::Cancel));
        }

        self.status = BookingStatus::Cancelled;
        if self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Cancels an abandoned checkout. Only `pending/pending` bookings expire;
    /// the cancellation itself is [`Booking::cancel`]. A crypto booking with
    /// a reported transfer is awaiting an administrator and never expires.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] for any other state or a booking
    /// with a claimed payment.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != BookingStatus::Pending
            || self.payment_status != PaymentStatus::Pending
            || self.claimed_payment_ref.is_some()
        {
            return Err(self.illegal(BookingAction::Cancel));
        }
        self.cancel(now)
    }

    /// Marks a confirmed charter as completed.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] unless the booking is confirmed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != BookingStatus::Confirmed {
            return Err(self.illegal(BookingAction::Complete));
        }

        self.status = BookingStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Stores the guest's self-reported crypto transfer reference.
    ///
    /// Leaves both statuses untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::MissingReference`] for a blank reference
    /// and [`TransitionError::Illegal`] unless this is a `pending/pending`
    /// crypto booking.
    pub fn record_payment_claim(
        &mut self,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if reference.trim().is_empty() {
            return Err(TransitionError::MissingReference);
        }
        if self.payment_method != PaymentMethod::Crypto
            || self.state()
                != (BookingState {
                    status: BookingStatus::Pending,
                    payment_status: PaymentStatus::Pending,
                })
        {
            return Err(self.illegal(BookingAction::ClaimPayment));
        }

        self.claimed_payment_ref = Some(reference.to_string());
        self.updated_at = now;
        Ok(())
    }
}
