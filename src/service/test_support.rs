//! Shared wiring for service tests: in-memory stores, a frozen clock and
//! the sandbox gateway.

#![allow(clippy::panic)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal_macros::dec;

use super::{AdmissionController, AdmissionRequest, BookingService, ReconciliationService};
use crate::domain::{
    BookingStore, Clock, DateRange, EventBus, FixedClock, InMemoryBookingStore, InMemoryYachtCatalog,
    PaymentMethod, UserId, Yacht, YachtId,
};
use crate::payment::{PaymentGateway, SandboxGateway, WebhookVerifier};

pub(crate) const WEBHOOK_SECRET: &str = "whsec_test";

/// July 2024 nights are in the future for this clock.
pub(crate) fn frozen_now() -> DateTime<Utc> {
    let Some(now) = DateTime::from_timestamp(1_714_521_600, 0) else {
        panic!("invalid timestamp");
    };
    now
}

/// Builds a 2024 range from `(month, day)` pairs.
pub(crate) fn range(start: (u32, u32), end: (u32, u32)) -> DateRange {
    let (Some(s), Some(e)) = (
        NaiveDate::from_ymd_opt(2024, start.0, start.1),
        NaiveDate::from_ymd_opt(2024, end.0, end.1),
    ) else {
        panic!("invalid date");
    };
    let Ok(range) = DateRange::new(s, e) else {
        panic!("invalid range {s}..{e}");
    };
    range
}

/// A card request for the fixture yacht with two guests.
pub(crate) fn request(fx: &Fixture, date_range: DateRange) -> AdmissionRequest {
    AdmissionRequest {
        yacht_id: fx.yacht.id,
        date_range,
        guest_count: 2,
        payment_method: PaymentMethod::Card,
        guest_id: Some(UserId::new("guest-1")),
    }
}

#[derive(Debug)]
pub(crate) struct Fixture {
    pub yacht: Yacht,
    pub store: Arc<InMemoryBookingStore>,
    pub event_bus: EventBus,
    pub clock: Arc<FixedClock>,
    pub gateway: Arc<SandboxGateway>,
    pub signer: WebhookVerifier,
    pub admission: AdmissionController,
    pub bookings: Arc<BookingService>,
    pub reconciliation: ReconciliationService,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let yacht = Yacht {
            id: YachtId::new(),
            name: "Aurora".to_string(),
            daily_rate: dec!(500),
            capacity: 8,
        };
        let store = Arc::new(InMemoryBookingStore::new());
        let catalog = Arc::new(InMemoryYachtCatalog::with_yachts([yacht.clone()]));
        let event_bus = EventBus::new(64);
        let clock = Arc::new(FixedClock(frozen_now()));
        let gateway = Arc::new(SandboxGateway::new());

        let admission = AdmissionController::new(
            catalog,
            Arc::clone(&store) as Arc<dyn BookingStore>,
            event_bus.clone(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let bookings = Arc::new(BookingService::new(
            Arc::clone(&store) as Arc<dyn BookingStore>,
            event_bus.clone(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let reconciliation = ReconciliationService::new(
            Arc::clone(&bookings),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            WebhookVerifier::new(WEBHOOK_SECRET, 300),
            "USD",
        );

        Self {
            yacht,
            store,
            event_bus,
            clock,
            gateway,
            signer: WebhookVerifier::new(WEBHOOK_SECRET, 300),
            admission,
            bookings,
            reconciliation,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
