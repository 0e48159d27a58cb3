//! Admission controller: turns a booking request into a stored booking.
//!
//! The availability check and the insert run inside a per-yacht critical
//! section ([`YachtLocks`]), so two overlapping requests for the same yacht
//! can never both be admitted by this process. The store's own overlap
//! guard covers several processes sharing one database.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::yacht_locks::YachtLocks;
use crate::domain::pricing;
use crate::domain::{
    AvailabilityChecker, Booking, BookingEvent, BookingStore, Clock, DateRange, EventBus,
    PaymentMethod, StoreError, UserId, Yacht, YachtCatalog, YachtId,
};
use crate::error::GatewayError;

/// Validated booking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// Requested yacht.
    pub yacht_id: YachtId,
    /// Requested nights.
    pub date_range: DateRange,
    /// Guests aboard.
    pub guest_count: u32,
    /// How the guest intends to pay.
    pub payment_method: PaymentMethod,
    /// Caller identity, `None` for guest checkout.
    pub guest_id: Option<UserId>,
}

/// Result of an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Availability {
    /// `true` when no active booking overlaps the range.
    pub available: bool,
    /// Ranges of the overlapping bookings, sorted by start.
    pub conflicts: Vec<DateRange>,
}

/// Admits booking requests without double-booking a yacht.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    catalog: Arc<dyn YachtCatalog>,
    store: Arc<dyn BookingStore>,
    checker: AvailabilityChecker,
    locks: Arc<YachtLocks>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Creates a controller over the given catalog and store.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn YachtCatalog>,
        store: Arc<dyn BookingStore>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            checker: AvailabilityChecker::new(Arc::clone(&store)),
            store,
            locks: Arc::new(YachtLocks::new()),
            event_bus,
            clock,
        }
    }

    /// Admits a booking request.
    ///
    /// On success the booking is stored as `pending/pending` with its price
    /// fixed, and a `BookingCreated` event is published.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a past start date, zero guests
    ///   or more guests than the yacht takes.
    /// - [`GatewayError::YachtNotFound`] for an unknown yacht.
    /// - [`GatewayError::Unavailable`] when active bookings overlap.
    /// - [`GatewayError::Pricing`] when the yacht's rate cannot be priced.
    /// - [`GatewayError::PersistenceError`] on storage failure.
    pub async fn admit(&self, request: AdmissionRequest) -> Result<Booking, GatewayError> {
        let yacht = self.validate(&request).await?;
        let range = request.date_range;

        let booking = {
            let _guard = self.locks.lock(yacht.id).await;

            let conflicts = self.checker.conflicts(yacht.id, &range).await?;
            if !conflicts.is_empty() {
                tracing::info!(yacht_id = %yacht.id, %range, ?conflicts, "booking request rejected: unavailable");
                return Err(GatewayError::Unavailable { conflicts });
            }

            let pricing = pricing::price(yacht.daily_rate, &range)?;
            let booking = Booking::new(
                yacht.id,
                request.guest_id,
                range,
                request.guest_count,
                pricing,
                request.payment_method,
                self.clock.now(),
            );

            match self.store.insert(&booking).await {
                Ok(()) => {}
                Err(StoreError::Overlap(_)) => {
                    let conflicts = self.checker.conflicts(yacht.id, &range).await?;
                    tracing::info!(yacht_id = %yacht.id, %range, "booking request lost a cross-instance race");
                    return Err(GatewayError::Unavailable { conflicts });
                }
                Err(err) => return Err(err.into()),
            }
            booking
        };

        let _ = self.event_bus.publish(BookingEvent::BookingCreated {
            booking_id: booking.id,
            yacht_id: booking.yacht_id,
            date_range: booking.date_range,
            payment_method: booking.payment_method,
            total: booking.pricing.total.to_string(),
            timestamp: booking.created_at,
        });

        tracing::info!(
            booking_id = %booking.id,
            yacht_id = %booking.yacht_id,
            range = %booking.date_range,
            total = %booking.pricing.total,
            method = booking.payment_method.as_str(),
            "booking admitted"
        );
        Ok(booking)
    }

    /// Reports whether `range` is free on `yacht_id`.
    ///
    /// Read-only; a free range may be taken before the caller books it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::YachtNotFound`] for an unknown yacht.
    pub async fn check_availability(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
    ) -> Result<Availability, GatewayError> {
        if self.catalog.get_yacht(yacht_id).await?.is_none() {
            return Err(GatewayError::YachtNotFound(yacht_id));
        }
        let conflicts = self.checker.conflicts(yacht_id, range).await?;
        Ok(Availability {
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    async fn validate(&self, request: &AdmissionRequest) -> Result<Yacht, GatewayError> {
        let today = self.clock.today();
        if request.date_range.start() < today {
            return Err(GatewayError::InvalidRequest(format!(
                "start date {} is in the past",
                request.date_range.start()
            )));
        }
        if request.guest_count == 0 {
            return Err(GatewayError::InvalidRequest(
                "guest_count must be at least 1".to_string(),
            ));
        }

        let yacht = self
            .catalog
            .get_yacht(request.yacht_id)
            .await?
            .ok_or(GatewayError::YachtNotFound(request.yacht_id))?;

        if request.guest_count > yacht.capacity {
            return Err(GatewayError::InvalidRequest(format!(
                "{} guests exceed the capacity of {} ({})",
                request.guest_count, yacht.name, yacht.capacity
            )));
        }
        Ok(yacht)
    }
}
