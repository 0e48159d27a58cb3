//! DTOs for payment endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::{CryptoSettlement, WebhookAck};

/// Request body for `POST /bookings/{id}/confirm-payment`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfirmPaymentRequest {
    /// Card: the payment intent id. Crypto: the transfer reference.
    pub reference: String,
}

/// Administrator verdict on a crypto payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Funds arrived.
    Paid,
    /// Funds did not arrive.
    Rejected,
}

/// Request body for `POST /admin/bookings/{id}/settle`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettlePaymentRequest {
    /// Verdict.
    pub outcome: SettlementOutcome,
    /// Settlement reference; defaults to the guest's reported one.
    #[serde(default)]
    pub reference: Option<String>,
}

impl From<SettlePaymentRequest> for CryptoSettlement {
    fn from(req: SettlePaymentRequest) -> Self {
        match req.outcome {
            SettlementOutcome::Paid => Self::Paid {
                reference: req.reference,
            },
            SettlementOutcome::Rejected => Self::Rejected,
        }
    }
}

/// Response to a verified webhook delivery.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct WebhookAckResponse {
    /// Always `true`: the delivery was accepted.
    pub received: bool,
    /// What the delivery did.
    pub outcome: WebhookAck,
}
