//! Payment gateway capability consumed by the reconciliation service.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::BookingId;

/// Failure talking to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentGatewayError {
    /// Network failure, timeout or gateway-side 5xx. Safe to retry.
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway refused the request.
    #[error("payment gateway rejected request: {0}")]
    Rejected(String),

    /// The referenced intent does not exist.
    #[error("payment intent not found: {0}")]
    NotFound(String),
}

/// Metadata attached to an intent at creation and echoed back in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMetadata {
    /// Booking the payment is for.
    pub booking_id: BookingId,
}

/// Freshly created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentIntent {
    /// Gateway identifier of the intent.
    pub intent_id: String,
    /// Secret the client uses to complete the payment.
    pub client_secret: String,
}

/// Gateway-side status of an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    /// Funds captured.
    Succeeded,
    /// Payment is being processed.
    Processing,
    /// Waiting for the customer (payment method, 3-D Secure, ...).
    RequiresAction(String),
    /// Intent was cancelled; it can no longer succeed.
    Canceled,
}

/// Final outcome of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The payment went through.
    Succeeded,
    /// The payment cannot go through.
    Failed,
}

impl IntentStatus {
    /// Parses a gateway status string.
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "canceled" => Self::Canceled,
            other => Self::RequiresAction(other.to_string()),
        }
    }

    /// Returns the final outcome, or `None` while the payment is in flight.
    #[must_use]
    pub const fn outcome(&self) -> Option<PaymentOutcome> {
        match self {
            Self::Succeeded => Some(PaymentOutcome::Succeeded),
            Self::Canceled => Some(PaymentOutcome::Failed),
            Self::Processing | Self::RequiresAction(_) => None,
        }
    }
}

/// Authoritative view of an intent as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentSnapshot {
    /// Gateway identifier of the intent.
    pub intent_id: String,
    /// Current status.
    pub status: IntentStatus,
    /// Amount in the currency's minor unit.
    pub amount_minor: i64,
    /// Lowercase ISO currency code.
    pub currency: String,
    /// Booking id from the intent metadata, if present and well-formed.
    pub booking_id: Option<BookingId>,
}

/// External payment gateway.
///
/// Constructed once at startup and injected into the services.
#[async_trait]
pub trait PaymentGateway: Send + Sync + Debug {
    /// Creates a payment intent for `amount_minor` units of `currency`.
    ///
    /// Repeated calls for the same booking return the same intent.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentGatewayError>;

    /// Fetches the current state of an intent.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, PaymentGatewayError>;
}
