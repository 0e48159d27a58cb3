//! Persistence layer: PostgreSQL bookings, fleet and audit log.
//!
//! [`PostgresStore`] implements the domain storage ports and the audit
//! [`crate::service::EventSink`] on top of `sqlx::PgPool`. Schema lives in
//! `migrations/` and is applied at startup.

pub mod models;
pub mod postgres;

pub use postgres::PostgresStore;
