//! Payment reconciliation: converges a booking's payment status with the
//! gateway's record.
//!
//! Two paths report the same payment: the guest's client confirming after
//! checkout, and the gateway's signed webhook. Either may arrive first,
//! twice, or out of order. Both end in the same settlement step,
//! which applies at most one payment transition per booking: once the
//! payment status is terminal every later report is a duplicate.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::booking_service::{BookingService, MAX_TRANSITION_ATTEMPTS};
use crate::domain::{
    Booking, BookingAction, BookingId, BookingStatus, CancelReason, PaymentMethod, PaymentStatus,
    TransitionError,
};
use crate::error::GatewayError;
use crate::payment::{
    GatewayEventKind, IntentMetadata, PaymentGateway, PaymentOutcome, WebhookError,
    WebhookVerifier,
};

/// What happened to a verified webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    /// The event changed the booking.
    Applied,
    /// The payment was already settled; nothing changed.
    Duplicate,
    /// No booking matches the event.
    Orphaned,
    /// The event does not apply to the booking in its current state.
    Ignored,
}

/// Card payment intent handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentIntentDetails {
    /// Gateway identifier of the intent; the client confirms with it.
    pub intent_id: String,
    /// Secret the client uses to complete the payment.
    pub client_secret: String,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Lowercase ISO currency code.
    pub currency: String,
}

#[derive(Debug)]
enum Settlement {
    Applied(Booking),
    AlreadySettled(Booking),
    NotApplicable(Booking, TransitionError),
    LateCapture(Booking, TransitionError),
    NotCard(Booking),
    Missing,
}

/// Reconciles card payments reported by clients and by the gateway.
#[derive(Debug)]
pub struct ReconciliationService {
    bookings: Arc<BookingService>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: WebhookVerifier,
    currency: String,
}

impl ReconciliationService {
    /// Creates the service with an explicitly constructed gateway client.
    #[must_use]
    pub fn new(
        bookings: Arc<BookingService>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: WebhookVerifier,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            bookings,
            gateway,
            verifier,
            currency: currency.into().to_ascii_lowercase(),
        }
    }

    /// Opens a card payment for the booking's total.
    ///
    /// Repeated calls return the same intent.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::BookingNotFound`] for an unknown booking.
    /// - [`GatewayError::InvalidRequest`] for a crypto booking.
    /// - [`GatewayError::IllegalTransition`] unless the booking is `pending/pending`.
    /// - [`GatewayError::GatewayUnreachable`] if the gateway does not answer.
    pub async fn create_payment_intent(
        &self,
        id: BookingId,
    ) -> Result<PaymentIntentDetails, GatewayError> {
        let booking = self.bookings.get_booking(id).await?;
        if booking.payment_method != PaymentMethod::Card {
            return Err(GatewayError::InvalidRequest(format!(
                "booking {id} is paid by crypto transfer"
            )));
        }
        if booking.status != BookingStatus::Pending
            || booking.payment_status != PaymentStatus::Pending
        {
            return Err(GatewayError::IllegalTransition(TransitionError::Illegal {
                booking_id: id,
                action: BookingAction::ConfirmPayment,
                state: booking.state(),
            }));
        }

        let amount_minor = booking.pricing.total_minor_units()?;
        let intent = self
            .gateway
            .create_intent(amount_minor, &self.currency, &IntentMetadata { booking_id: id })
            .await?;

        tracing::info!(
            booking_id = %id,
            intent_id = %intent.intent_id,
            amount_minor,
            currency = %self.currency,
            "payment intent created"
        );
        Ok(PaymentIntentDetails {
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            amount_minor,
            currency: self.currency.clone(),
        })
    }

    /// Handles the client's report that it completed a payment.
    ///
    /// Card bookings are checked against the gateway; the client's word is
    /// never enough. Crypto bookings only record the claimed reference and
    /// stay `pending/pending` for manual settlement.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::BookingNotFound`] for an unknown booking.
    /// - [`GatewayError::InvalidRequest`] for a blank reference or an intent
    ///   that belongs to another booking, amount or currency.
    /// - [`GatewayError::GatewayUnreachable`] if the gateway does not answer;
    ///   nothing is changed and the client may retry.
    /// - [`GatewayError::IllegalTransition`] when the booking can no longer
    ///   take the reported outcome.
    pub async fn on_client_confirm(
        &self,
        id: BookingId,
        reference: &str,
    ) -> Result<Booking, GatewayError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(TransitionError::MissingReference.into());
        }

        let booking = self.bookings.get_booking(id).await?;
        if booking.payment_method == PaymentMethod::Crypto {
            return self.bookings.record_payment_claim(id, reference).await;
        }
        if booking.payment_status.is_terminal() {
            tracing::debug!(booking_id = %id, state = %booking.state(), "payment already settled");
            return Ok(booking);
        }

        let snapshot = self.gateway.retrieve_intent(reference).await?;
        let expected_minor = booking.pricing.total_minor_units()?;
        if snapshot.booking_id != Some(id)
            || snapshot.amount_minor != expected_minor
            || snapshot.currency != self.currency
        {
            tracing::warn!(
                booking_id = %id,
                intent_id = %snapshot.intent_id,
                intent_booking = ?snapshot.booking_id,
                amount_minor = snapshot.amount_minor,
                expected_minor,
                currency = %snapshot.currency,
                "payment reference does not match booking"
            );
            return Err(GatewayError::InvalidRequest(
                "payment reference does not belong to this booking".to_string(),
            ));
        }

        let Some(outcome) = snapshot.status.outcome() else {
            tracing::debug!(booking_id = %id, status = ?snapshot.status, "payment still in flight");
            return Ok(booking);
        };

        match self.settle(id, &snapshot.intent_id, outcome).await? {
            Settlement::Applied(booking) | Settlement::AlreadySettled(booking) => Ok(booking),
            Settlement::NotApplicable(booking, err) | Settlement::LateCapture(booking, err) => {
                warn_unapplicable(&booking, outcome, &snapshot.intent_id);
                Err(err.into())
            }
            Settlement::NotCard(booking) => Ok(booking),
            Settlement::Missing => Err(GatewayError::BookingNotFound(id)),
        }
    }

    /// Handles a raw webhook delivery.
    ///
    /// Only unverifiable deliveries and storage failures are errors. Every
    /// verified event is acknowledged, so the gateway stops redelivering
    /// events that cannot apply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GatewayUnverified`] for a missing or invalid
    /// signature and [`GatewayError::PersistenceError`] on storage failure.
    pub async fn on_gateway_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, GatewayError> {
        let Some(signature) = signature else {
            return Err(WebhookError::MalformedHeader.into());
        };
        let event = match self
            .verifier
            .verify(payload, signature, self.bookings.clock().now())
        {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "rejected unverified gateway event");
                return Err(err.into());
            }
        };

        let outcome = match event.kind {
            GatewayEventKind::Succeeded => PaymentOutcome::Succeeded,
            GatewayEventKind::Failed => PaymentOutcome::Failed,
            GatewayEventKind::Other(ref event_type) => {
                tracing::debug!(event_id = %event.event_id, event_type, "ignoring gateway event");
                return Ok(WebhookAck::Ignored);
            }
        };

        let Some(booking_id) = event.booking_id else {
            tracing::warn!(
                event_id = %event.event_id,
                intent_id = %event.intent_id,
                "orphaned gateway event: no booking id"
            );
            return Ok(WebhookAck::Orphaned);
        };

        let ack = match self.settle(booking_id, &event.intent_id, outcome).await? {
            Settlement::Applied(_) => WebhookAck::Applied,
            Settlement::AlreadySettled(booking) => {
                tracing::debug!(
                    %booking_id,
                    event_id = %event.event_id,
                    state = %booking.state(),
                    "duplicate gateway event"
                );
                WebhookAck::Duplicate
            }
            Settlement::NotApplicable(booking, _) | Settlement::LateCapture(booking, _) => {
                warn_unapplicable(&booking, outcome, &event.intent_id);
                WebhookAck::Ignored
            }
            Settlement::NotCard(_) => {
                tracing::warn!(
                    %booking_id,
                    event_id = %event.event_id,
                    "gateway event for a crypto booking ignored"
                );
                WebhookAck::Ignored
            }
            Settlement::Missing => {
                tracing::warn!(
                    %booking_id,
                    event_id = %event.event_id,
                    "orphaned gateway event: unknown booking"
                );
                WebhookAck::Orphaned
            }
        };
        Ok(ack)
    }

    /// Applies `outcome` unless the payment is already settled.
    async fn settle(
        &self,
        id: BookingId,
        reference: &str,
        outcome: PaymentOutcome,
    ) -> Result<Settlement, GatewayError> {
        let store = self.bookings.store();
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let Some(mut booking) = store.get(id).await? else {
                return Ok(Settlement::Missing);
            };
            if booking.payment_method != PaymentMethod::Card {
                return Ok(Settlement::NotCard(booking));
            }
            if booking.payment_status.is_terminal() {
                return Ok(Settlement::AlreadySettled(booking));
            }

            let before = booking.state();
            let now = self.bookings.clock().now();
            let applied = match outcome {
                PaymentOutcome::Succeeded => booking.confirm_payment(reference, now),
                PaymentOutcome::Failed => booking.record_payment_failure(now),
            };
            if let Err(err) = applied {
                // A capture for a cancelled booking is kept so that stale
                // failures for the same payment read as duplicates.
                if outcome != PaymentOutcome::Succeeded
                    || booking.record_late_capture(reference, now).is_err()
                {
                    return Ok(Settlement::NotApplicable(booking, err));
                }
                if store.update_state(&booking, before).await? {
                    return Ok(Settlement::LateCapture(booking, err));
                }
                tracing::debug!(booking_id = %id, "concurrent update, retrying reconciliation");
                continue;
            }

            if store.update_state(&booking, before).await? {
                self.bookings
                    .publish_payment_outcome(before, &booking, CancelReason::PaymentFailed);
                tracing::info!(
                    booking_id = %id,
                    from = %before,
                    to = %booking.state(),
                    reference,
                    "payment reconciled"
                );
                return Ok(Settlement::Applied(booking));
            }
            tracing::debug!(booking_id = %id, "concurrent update, retrying reconciliation");
        }
        Err(GatewayError::Internal(format!(
            "booking {id} kept changing during reconciliation"
        )))
    }
}

fn warn_unapplicable(booking: &Booking, outcome: PaymentOutcome, intent_id: &str) {
    if outcome == PaymentOutcome::Succeeded {
        tracing::warn!(
            booking_id = %booking.id,
            state = %booking.state(),
            intent_id,
            "payment captured for a booking that can no longer be confirmed; manual refund required"
        );
    } else {
        tracing::warn!(
            booking_id = %booking.id,
            state = %booking.state(),
            intent_id,
            "payment failure does not apply to booking"
        );
    }
}
