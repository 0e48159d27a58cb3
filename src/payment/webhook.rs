//! Signed webhook verification.
//!
//! The gateway signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{raw body}"` and sends the result in the
//! [`SIGNATURE_HEADER`] header as `t=<unix seconds>,v1=<hex digest>`.
//! Several `v1` entries may be present while the gateway rotates secrets.
//! Nothing in an event is looked at before the signature checks out.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::BookingId;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook delivery is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    /// No signature header, or one without `t` / `v1` entries.
    #[error("malformed signature header")]
    MalformedHeader,

    /// No `v1` entry matches the expected digest.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Timestamp outside the accepted tolerance window.
    #[error("signature timestamp outside tolerance")]
    Expired,

    /// Signature is valid but the body is not a recognizable event.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Kind of a verified gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    /// The intent succeeded.
    Succeeded,
    /// The intent failed or was cancelled.
    Failed,
    /// Any other event type; acknowledged and ignored.
    Other(String),
}

/// Verified event pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    /// Gateway event identifier.
    pub event_id: String,
    /// What happened.
    pub kind: GatewayEventKind,
    /// Intent the event is about.
    pub intent_id: String,
    /// Booking id from the intent metadata, if present and well-formed.
    pub booking_id: Option<BookingId>,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: RawIntent,
}

#[derive(Deserialize)]
struct RawIntent {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Verifies webhook signatures with a shared secret.
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    /// Creates a verifier for `secret`, accepting timestamps up to
    /// `tolerance_secs` away from the current time.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX),
        }
    }

    fn digest(&self, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| WebhookError::SignatureMismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let bytes = mac.finalize().into_bytes();
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        Ok(hex)
    }

    /// Produces a signature header value for `payload`.
    ///
    /// Used by the sandbox gateway and tests to emit deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::SignatureMismatch`] if the MAC cannot be keyed.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        Ok(format!("t={timestamp},v1={}", self.digest(timestamp, payload)?))
    }

    /// Checks the signature and decodes the event.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] when the header is malformed, no digest
    /// matches, the timestamp is stale, or the body is not an event.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<GatewayEvent, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }
        let Some(timestamp) = timestamp else {
            return Err(WebhookError::MalformedHeader);
        };
        if candidates.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let expected = self.digest(timestamp, payload)?;
        let matched = candidates
            .iter()
            .any(|c| constant_time_eq::constant_time_eq(c.as_bytes(), expected.as_bytes()));
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if (now.timestamp() - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::Expired);
        }

        parse_event(payload)
    }
}

fn parse_event(payload: &[u8]) -> Result<GatewayEvent, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    let kind = match raw.event_type.as_str() {
        "payment_intent.succeeded" => GatewayEventKind::Succeeded,
        "payment_intent.payment_failed" | "payment_intent.canceled" => GatewayEventKind::Failed,
        _ => GatewayEventKind::Other(raw.event_type),
    };
    let booking_id = raw
        .data
        .object
        .metadata
        .get("booking_id")
        .and_then(|id| id.parse().ok());

    Ok(GatewayEvent {
        event_id: raw.id,
        kind,
        intent_id: raw.data.object.id,
        booking_id,
    })
}
