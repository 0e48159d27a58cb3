//! In-process payment gateway for local runs and tests.
//!
//! Intents live in memory and stay `requires_payment_method` until a test
//! (or a developer) drives them with [`SandboxGateway::set_status`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::gateway::{
    IntentMetadata, IntentSnapshot, IntentStatus, PaymentGateway, PaymentGatewayError,
    PaymentIntent,
};
use crate::domain::BookingId;

#[derive(Debug, Default)]
struct SandboxState {
    intents: HashMap<String, IntentSnapshot>,
    by_booking: HashMap<BookingId, PaymentIntent>,
}

/// Fake gateway backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct SandboxGateway {
    state: RwLock<SandboxState>,
    offline: AtomicBool,
}

impl SandboxGateway {
    /// Creates an empty sandbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails as unreachable while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Moves an intent to `status`. Returns `false` for unknown intents.
    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> bool {
        let mut state = self.state.write().await;
        match state.intents.get_mut(intent_id) {
            Some(intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }

    /// Registers an intent directly, bypassing `create_intent`.
    pub async fn insert_intent(&self, snapshot: IntentSnapshot) {
        self.state
            .write()
            .await
            .intents
            .insert(snapshot.intent_id.clone(), snapshot);
    }

    fn check_online(&self) -> Result<(), PaymentGatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PaymentGatewayError::Unreachable(
                "sandbox gateway offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentGatewayError> {
        self.check_online()?;
        if amount_minor <= 0 {
            return Err(PaymentGatewayError::Rejected(
                "amount must be positive".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if let Some(existing) = state.by_booking.get(&metadata.booking_id) {
            return Ok(existing.clone());
        }

        let intent_id = format!("pi_sandbox_{}", uuid::Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: format!("{intent_id}_secret_{}", uuid::Uuid::new_v4().simple()),
            intent_id: intent_id.clone(),
        };
        state.intents.insert(
            intent_id.clone(),
            IntentSnapshot {
                intent_id,
                status: IntentStatus::RequiresAction("requires_payment_method".to_string()),
                amount_minor,
                currency: currency.to_ascii_lowercase(),
                booking_id: Some(metadata.booking_id),
            },
        );
        state.by_booking.insert(metadata.booking_id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot, PaymentGatewayError> {
        self.check_online()?;
        self.state
            .read()
            .await
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentGatewayError::NotFound(intent_id.to_string()))
    }
}
