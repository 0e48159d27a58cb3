//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies reject unknown fields. Monetary amounts inside bookings
//! serialize as decimal strings.

pub mod booking_dto;
pub mod common_dto;
pub mod payment_dto;

pub use booking_dto::*;
pub use common_dto::*;
pub use payment_dto::*;
