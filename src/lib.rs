//! # marina-gateway
//!
//! REST gateway for yacht booking admission and payment reconciliation.
//!
//! Guests request a yacht for a date range; the admission controller
//! guarantees that no two live bookings for the same yacht overlap, prices
//! the request and records it as pending. Payment is settled either by a
//! card processor (client confirmation or signed webhook, whichever arrives
//! first) or by an operator for crypto transfers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)          Card processor (webhooks)
//!     │                          │
//!     ├── REST Handlers (api/) ──┘
//!     │
//!     ├── AdmissionController, BookingService,
//!     │   ReconciliationService (service/)
//!     ├── EventBus, pricing, booking state machine (domain/)
//!     ├── PaymentGateway (payment/)
//!     │
//!     └── BookingStore: in-memory or PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod payment;
pub mod persistence;
pub mod service;
