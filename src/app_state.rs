//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::{AdmissionController, BookingService, ReconciliationService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Admits booking requests.
    pub admission: Arc<AdmissionController>,
    /// Booking lookups and lifecycle transitions.
    pub bookings: Arc<BookingService>,
    /// Payment reconciliation.
    pub reconciliation: Arc<ReconciliationService>,
    /// Event bus for the audit recorder.
    pub event_bus: EventBus,
    /// Bearer token for admin routes; `None` disables them.
    pub admin_token: Option<Arc<str>>,
}
