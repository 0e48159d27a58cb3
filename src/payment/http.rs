//! HTTP client for a Stripe-compatible payment intents API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::gateway::{
    IntentMetadata, IntentSnapshot, IntentStatus, PaymentGateway, PaymentGatewayError,
    PaymentIntent,
};

/// Payment gateway reached over HTTPS with a secret API key.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.base_url)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct IntentBody {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl HttpPaymentGateway {
    /// Builds a client for `base_url` (e.g. `https://api.stripe.com`).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGatewayError::Unreachable`] if the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentGatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentGatewayError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn read_intent(
        response: reqwest::Response,
        intent_id: &str,
    ) -> Result<IntentBody, PaymentGatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<IntentBody>()
                .await
                .map_err(|e| PaymentGatewayError::Unreachable(format!("invalid response: {e}")));
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => PaymentGatewayError::NotFound(intent_id.to_string()),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                PaymentGatewayError::Unreachable(format!("{s}: {message}"))
            }
            s => PaymentGatewayError::Rejected(format!("{s}: {message}")),
        })
    }
}

fn transport_error(e: &reqwest::Error) -> PaymentGatewayError {
    PaymentGatewayError::Unreachable(e.to_string())
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentGatewayError> {
        let booking_id = metadata.booking_id.to_string();
        let form = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("metadata[booking_id]", booking_id.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("booking-{booking_id}"))
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body = Self::read_intent(response, "").await?;
        let client_secret = body.client_secret.ok_or_else(|| {
            PaymentGatewayError::Rejected("intent created without client secret".to_string())
        })?;

        tracing::debug!(intent_id = %body.id, %booking_id, "payment intent created");
        Ok(PaymentIntent {
            intent_id: body.id,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, PaymentGatewayError> {
        if intent_id.is_empty() || !intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PaymentGatewayError::NotFound(intent_id.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/payment_intents/{intent_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body = Self::read_intent(response, intent_id).await?;
        Ok(IntentSnapshot {
            intent_id: body.id,
            status: IntentStatus::parse(&body.status),
            amount_minor: body.amount,
            currency: body.currency.to_ascii_lowercase(),
            booking_id: body.metadata.get("booking_id").and_then(|id| id.parse().ok()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    // Nothing listens on the discard port.
    fn offline_gateway() -> HttpPaymentGateway {
        let Ok(gateway) =
            HttpPaymentGateway::new("http://127.0.0.1:9/", "sk_test", Duration::from_secs(2))
        else {
            panic!("client construction failed");
        };
        gateway
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        assert_eq!(offline_gateway().base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn debug_redacts_secret_key() {
        let rendered = format!("{:?}", offline_gateway());
        assert!(!rendered.contains("sk_test"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn malformed_intent_id_is_not_found_without_a_request() {
        let gateway = offline_gateway();
        for id in ["", "../v1/charges", "pi_1?expand=all"] {
            let Err(PaymentGatewayError::NotFound(_)) = gateway.retrieve_intent(id).await else {
                panic!("expected NotFound for {id:?}");
            };
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let Err(PaymentGatewayError::Unreachable(_)) = offline_gateway().retrieve_intent("pi_1").await
        else {
            panic!("expected Unreachable");
        };
    }
}
