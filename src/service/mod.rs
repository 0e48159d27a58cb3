//! Service layer: business logic orchestration.
//!
//! [`AdmissionController`] admits booking requests under a per-yacht lock,
//! [`BookingService`] runs the lifecycle transitions and
//! [`ReconciliationService`] settles payments reported by clients and by
//! the gateway. All of them emit events through the
//! [`super::domain::EventBus`].

pub mod admission;
pub mod audit;
pub mod booking_service;
pub mod reconciliation;
pub mod sweeper;
pub mod yacht_locks;

#[cfg(test)]
pub(crate) mod test_support;

pub use admission::{AdmissionController, AdmissionRequest, Availability};
pub use audit::{EventSink, spawn_event_recorder};
pub use booking_service::{BookingService, CryptoSettlement};
pub use reconciliation::{PaymentIntentDetails, ReconciliationService, WebhookAck};
pub use sweeper::spawn_expiry_sweeper;
pub use yacht_locks::YachtLocks;
