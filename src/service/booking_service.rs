//! Booking lifecycle operations: lookups, cancellation, completion, crypto
//! settlement and expiry of abandoned checkouts.
//!
//! Every mutation follows the same pattern: load the booking, run the state
//! machine transition, write it back only if the stored state is still the
//! one the transition started from, and emit events. A lost race reloads
//! and re-evaluates against the newer state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    Booking, BookingEvent, BookingFilter, BookingId, BookingPage, BookingState, BookingStatus,
    BookingStore, CancelReason, Clock, EventBus, PageRequest, PaymentMethod, PaymentStatus,
    TransitionError,
};
use crate::error::GatewayError;

/// Bound on reload-and-retry rounds for a single mutation.
pub(crate) const MAX_TRANSITION_ATTEMPTS: usize = 5;

/// Administrative decision on a crypto transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoSettlement {
    /// Funds arrived. `reference` defaults to the guest's claimed reference.
    Paid {
        /// Settlement reference recorded on the booking.
        reference: Option<String>,
    },
    /// Funds never arrived or did not match.
    Rejected,
}

/// Orchestration layer for booking lifecycle operations.
#[derive(Debug, Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    /// Creates a new `BookingService`.
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>, event_bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            event_bus,
            clock,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    /// Returns the injected clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BookingNotFound`] if no booking has this id.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, GatewayError> {
        self.store
            .get(id)
            .await?
            .ok_or(GatewayError::BookingNotFound(id))
    }

    /// Lists one page of bookings matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<BookingPage, GatewayError> {
        Ok(self.store.list(filter, page).await?)
    }

    /// Cancels a booking on the guest's request. A captured payment becomes
    /// `refunded`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BookingNotFound`] or
    /// [`GatewayError::IllegalTransition`] for cancelled or completed bookings.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, GatewayError> {
        let (before, booking) = self.transition(id, Booking::cancel).await?;
        self.publish_cancelled(&booking, CancelReason::Guest);
        tracing::info!(
            booking_id = %id,
            yacht_id = %booking.yacht_id,
            from = %before,
            to = %booking.state(),
            "booking cancelled"
        );
        Ok(booking)
    }

    /// Marks a confirmed charter as completed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BookingNotFound`] or
    /// [`GatewayError::IllegalTransition`] unless the booking is confirmed.
    pub async fn complete_booking(&self, id: BookingId) -> Result<Booking, GatewayError> {
        let (_, booking) = self.transition(id, Booking::complete).await?;
        let _ = self.event_bus.publish(BookingEvent::BookingCompleted {
            booking_id: booking.id,
            yacht_id: booking.yacht_id,
            timestamp: booking.updated_at,
        });
        tracing::info!(booking_id = %id, yacht_id = %booking.yacht_id, "booking completed");
        Ok(booking)
    }

    /// Stores the guest's reported crypto transfer reference. The booking
    /// stays `pending/pending` until an administrator settles it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BookingNotFound`],
    /// [`GatewayError::InvalidRequest`] for a blank reference, or
    /// [`GatewayError::IllegalTransition`] unless the booking is an unpaid
    /// crypto booking.
    pub async fn record_payment_claim(
        &self,
        id: BookingId,
        reference: &str,
    ) -> Result<Booking, GatewayError> {
        let (_, booking) = self
            .transition(id, |b, now| b.record_payment_claim(reference, now))
            .await?;
        let _ = self.event_bus.publish(BookingEvent::PaymentClaimed {
            booking_id: booking.id,
            yacht_id: booking.yacht_id,
            reference: reference.to_string(),
            timestamp: booking.updated_at,
        });
        tracing::info!(
            booking_id = %id,
            reference,
            "crypto payment reported by guest, awaiting settlement"
        );
        Ok(booking)
    }

    /// Applies an administrator's decision on a crypto payment.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::BookingNotFound`] for an unknown booking.
    /// - [`GatewayError::InvalidRequest`] for a card booking, or a `Paid`
    ///   decision with neither a reference nor a guest claim.
    /// - [`GatewayError::IllegalTransition`] if the payment is no longer
    ///   pending.
    pub async fn settle_crypto_payment(
        &self,
        id: BookingId,
        settlement: CryptoSettlement,
    ) -> Result<Booking, GatewayError> {
        let current = self.get_booking(id).await?;
        if current.payment_method != PaymentMethod::Crypto {
            return Err(GatewayError::InvalidRequest(format!(
                "booking {id} is paid by card; card payments settle through the gateway"
            )));
        }

        match settlement {
            CryptoSettlement::Paid { reference } => {
                let reference = reference
                    .filter(|r| !r.trim().is_empty())
                    .or_else(|| current.claimed_payment_ref.clone())
                    .ok_or_else(|| {
                        GatewayError::InvalidRequest(
                            "a settlement reference is required: the guest reported none"
                                .to_string(),
                        )
                    })?;
                let (before, booking) = self
                    .transition(id, |b, now| b.confirm_payment(&reference, now))
                    .await?;
                self.publish_payment_outcome(before, &booking, CancelReason::PaymentRejected);
                tracing::info!(booking_id = %id, %reference, "crypto payment settled");
                Ok(booking)
            }
            CryptoSettlement::Rejected => {
                let (before, booking) = self.transition(id, Booking::record_payment_failure).await?;
                self.publish_payment_outcome(before, &booking, CancelReason::PaymentRejected);
                tracing::warn!(booking_id = %id, "crypto payment rejected by administrator");
                Ok(booking)
            }
        }
    }

    /// Cancels `pending/pending` bookings created more than `max_age` ago.
    ///
    /// Returns the number of bookings expired. A booking paid in the
    /// meantime is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the candidates cannot be
    /// listed. Failures on individual bookings are logged and skipped.
    pub async fn expire_stale_pending(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<usize, GatewayError> {
        let cutoff = now - max_age;
        let stale = self.store.stale_pending(cutoff).await?;

        let mut expired = 0;
        for candidate in stale {
            match self.transition(candidate.id, Booking::expire).await {
                Ok((_, booking)) => {
                    self.publish_cancelled(&booking, CancelReason::Expired);
                    tracing::info!(
                        booking_id = %booking.id,
                        yacht_id = %booking.yacht_id,
                        created_at = %booking.created_at,
                        "unpaid booking expired"
                    );
                    expired += 1;
                }
                Err(GatewayError::IllegalTransition(_)) => {
                    tracing::debug!(booking_id = %candidate.id, "booking settled before expiry");
                }
                Err(err) => {
                    tracing::warn!(booking_id = %candidate.id, error = %err, "failed to expire booking");
                }
            }
        }
        Ok(expired)
    }

    /// Loads `id`, applies `apply` and writes the result back if nobody else
    /// changed the booking meanwhile. Returns the state before the change
    /// and the updated booking.
    pub(crate) async fn transition<F>(
        &self,
        id: BookingId,
        mut apply: F,
    ) -> Result<(BookingState, Booking), GatewayError>
    where
        F: FnMut(&mut Booking, DateTime<Utc>) -> Result<(), TransitionError>,
    {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let mut booking = self.get_booking(id).await?;
            let before = booking.state();
            apply(&mut booking, self.clock.now())?;
            if self.store.update_state(&booking, before).await? {
                return Ok((before, booking));
            }
            tracing::debug!(booking_id = %id, "concurrent update, retrying transition");
        }
        Err(GatewayError::Internal(format!(
            "booking {id} kept changing during the update"
        )))
    }

    /// Emits the events for a payment that was just confirmed or failed.
    /// `reason` applies when a failure also cancels the booking.
    pub(crate) fn publish_payment_outcome(
        &self,
        before: BookingState,
        booking: &Booking,
        reason: CancelReason,
    ) {
        match booking.payment_status {
            PaymentStatus::Paid => {
                let _ = self.event_bus.publish(BookingEvent::PaymentConfirmed {
                    booking_id: booking.id,
                    yacht_id: booking.yacht_id,
                    reference: booking.external_payment_ref.clone().unwrap_or_default(),
                    timestamp: booking.updated_at,
                });
            }
            PaymentStatus::Failed => {
                let _ = self.event_bus.publish(BookingEvent::PaymentFailed {
                    booking_id: booking.id,
                    yacht_id: booking.yacht_id,
                    timestamp: booking.updated_at,
                });
                if before.status != BookingStatus::Cancelled {
                    self.publish_cancelled(booking, reason);
                }
            }
            PaymentStatus::Pending | PaymentStatus::Refunded => {}
        }
    }

    fn publish_cancelled(&self, booking: &Booking, reason: CancelReason) {
        let _ = self.event_bus.publish(BookingEvent::BookingCancelled {
            booking_id: booking.id,
            yacht_id: booking.yacht_id,
            date_range: booking.date_range,
            reason,
            state: booking.state(),
            timestamp: booking.updated_at,
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::test_support::{Fixture, range, request};

    async fn admitted(fx: &Fixture, method: PaymentMethod) -> Booking {
        let mut req = request(fx, range((7, 1), (7, 4)));
        req.payment_method = method;
        let Ok(booking) = fx.admission.admit(req).await else {
            panic!("admission failed");
        };
        booking
    }

    async fn paid(fx: &Fixture) -> Booking {
        let booking = admitted(fx, PaymentMethod::Card).await;
        let Ok((_, booking)) = fx
            .bookings
            .transition(booking.id, |b, now| b.confirm_payment("pi_1", now))
            .await
        else {
            panic!("confirm failed");
        };
        booking
    }

    #[tokio::test]
    async fn get_unknown_booking_is_not_found() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.bookings.get_booking(BookingId::new()).await,
            Err(GatewayError::BookingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancel_paid_booking_refunds() {
        let fx = Fixture::new();
        let booking = paid(&fx).await;
        let mut rx = fx.event_bus.subscribe();

        let Ok(cancelled) = fx.bookings.cancel_booking(booking.id).await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);

        let Ok(BookingEvent::BookingCancelled { reason, .. }) = rx.try_recv() else {
            panic!("expected BookingCancelled");
        };
        assert_eq!(reason, CancelReason::Guest);
    }

    #[tokio::test]
    async fn cancel_completed_is_illegal_and_leaves_booking_untouched() {
        let fx = Fixture::new();
        let booking = paid(&fx).await;
        let Ok(completed) = fx.bookings.complete_booking(booking.id).await else {
            panic!("complete failed");
        };

        let result = fx.bookings.cancel_booking(booking.id).await;
        assert!(matches!(result, Err(GatewayError::IllegalTransition(_))));

        let Ok(after) = fx.bookings.get_booking(booking.id).await else {
            panic!("booking vanished");
        };
        assert_eq!(after, completed);
    }

    #[tokio::test]
    async fn complete_requires_confirmed() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Card).await;
        assert!(matches!(
            fx.bookings.complete_booking(booking.id).await,
            Err(GatewayError::IllegalTransition(_))
        ));
    }

    #[tokio::test]
    async fn crypto_claim_then_admin_settlement() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Crypto).await;

        let Ok(claimed) = fx.bookings.record_payment_claim(booking.id, "0xabc").await else {
            panic!("claim failed");
        };
        assert_eq!(claimed.status, BookingStatus::Pending);
        assert_eq!(claimed.payment_status, PaymentStatus::Pending);
        assert_eq!(claimed.claimed_payment_ref.as_deref(), Some("0xabc"));

        let Ok(settled) = fx
            .bookings
            .settle_crypto_payment(booking.id, CryptoSettlement::Paid { reference: None })
            .await
        else {
            panic!("settlement failed");
        };
        assert_eq!(settled.status, BookingStatus::Confirmed);
        assert_eq!(settled.payment_status, PaymentStatus::Paid);
        assert_eq!(settled.external_payment_ref.as_deref(), Some("0xabc"));

        assert!(matches!(
            fx.bookings
                .settle_crypto_payment(booking.id, CryptoSettlement::Rejected)
                .await,
            Err(GatewayError::IllegalTransition(_))
        ));
    }

    #[tokio::test]
    async fn crypto_settlement_needs_a_reference() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Crypto).await;
        assert!(matches!(
            fx.bookings
                .settle_crypto_payment(booking.id, CryptoSettlement::Paid { reference: None })
                .await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn crypto_rejection_cancels() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Crypto).await;
        let mut rx = fx.event_bus.subscribe();

        let Ok(rejected) = fx
            .bookings
            .settle_crypto_payment(booking.id, CryptoSettlement::Rejected)
            .await
        else {
            panic!("rejection failed");
        };
        assert_eq!(rejected.state().to_string(), "cancelled/failed");

        let Ok(first) = rx.try_recv() else {
            panic!("no event");
        };
        assert_eq!(first.event_type_str(), "payment_failed");
        let Ok(BookingEvent::BookingCancelled { reason, .. }) = rx.try_recv() else {
            panic!("expected BookingCancelled");
        };
        assert_eq!(reason, CancelReason::PaymentRejected);
    }

    #[tokio::test]
    async fn settling_a_card_booking_is_rejected() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Card).await;
        assert!(matches!(
            fx.bookings
                .settle_crypto_payment(
                    booking.id,
                    CryptoSettlement::Paid {
                        reference: Some("0x1".to_string())
                    }
                )
                .await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn expiry_cancels_only_stale_unpaid_bookings() {
        let fx = Fixture::new();
        let stale = admitted(&fx, PaymentMethod::Card).await;
        let mut req = request(&fx, range((8, 1), (8, 4)));
        req.payment_method = PaymentMethod::Card;
        let Ok(settled) = fx.admission.admit(req).await else {
            panic!("admission failed");
        };
        assert!(fx
            .bookings
            .transition(settled.id, |b, now| b.confirm_payment("pi_2", now))
            .await
            .is_ok());

        let later = fx.now() + Duration::minutes(90);
        let Ok(count) = fx
            .bookings
            .expire_stale_pending(later, Duration::minutes(60))
            .await
        else {
            panic!("sweep failed");
        };
        assert_eq!(count, 1);

        let (Ok(stale), Ok(settled)) = (
            fx.bookings.get_booking(stale.id).await,
            fx.bookings.get_booking(settled.id).await,
        ) else {
            panic!("bookings vanished");
        };
        assert_eq!(stale.state().to_string(), "cancelled/pending");
        assert_eq!(settled.state().to_string(), "confirmed/paid");

        let Ok(again) = fx
            .bookings
            .expire_stale_pending(later, Duration::minutes(60))
            .await
        else {
            panic!("sweep failed");
        };
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn recent_bookings_do_not_expire() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Card).await;
        let Ok(count) = fx
            .bookings
            .expire_stale_pending(fx.now() + Duration::minutes(10), Duration::minutes(60))
            .await
        else {
            panic!("sweep failed");
        };
        assert_eq!(count, 0);
        let Ok(after) = fx.bookings.get_booking(booking.id).await else {
            panic!("booking vanished");
        };
        assert_eq!(after.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn claimed_crypto_booking_survives_expiry_and_settles() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Crypto).await;
        assert!(fx.reconciliation.on_client_confirm(booking.id, "0xtxhash").await.is_ok());

        let Ok(count) = fx
            .bookings
            .expire_stale_pending(fx.now() + Duration::hours(2), Duration::minutes(60))
            .await
        else {
            panic!("sweep failed");
        };
        assert_eq!(count, 0);

        let Ok(settled) = fx
            .bookings
            .settle_crypto_payment(booking.id, CryptoSettlement::Paid { reference: None })
            .await
        else {
            panic!("settlement failed");
        };
        assert_eq!(settled.state().to_string(), "confirmed/paid");
        assert_eq!(settled.external_payment_ref.as_deref(), Some("0xtxhash"));
    }

    #[tokio::test]
    async fn unclaimed_crypto_booking_still_expires() {
        let fx = Fixture::new();
        let booking = admitted(&fx, PaymentMethod::Crypto).await;
        let Ok(count) = fx
            .bookings
            .expire_stale_pending(fx.now() + Duration::hours(2), Duration::minutes(60))
            .await
        else {
            panic!("sweep failed");
        };
        assert_eq!(count, 1);
        let Ok(after) = fx.bookings.get_booking(booking.id).await else {
            panic!("booking vanished");
        };
        assert_eq!(after.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let fx = Fixture::new();
        let first = paid(&fx).await;
        let mut req = request(&fx, range((9, 1), (9, 3)));
        req.payment_method = PaymentMethod::Card;
        assert!(fx.admission.admit(req).await.is_ok());

        let filter = BookingFilter {
            yacht_id: Some(fx.yacht.id),
            status: Some(BookingStatus::Confirmed),
        };
        let Ok(listed) = fx
            .bookings
            .list_bookings(&filter, PageRequest::for_page(1, 20))
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(listed.total, 1);
        assert!(listed.bookings.iter().all(|b| b.id == first.id));

        let Ok(all) = fx
            .bookings
            .list_bookings(&BookingFilter::default(), PageRequest::for_page(1, 20))
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(all.total, 2);

        let Ok(second) = fx
            .bookings
            .list_bookings(&BookingFilter::default(), PageRequest::for_page(2, 1))
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(second.total, 2);
        assert_eq!(second.bookings.len(), 1);
    }
}
