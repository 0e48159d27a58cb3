//! Storage ports consumed by the booking services.
//!
//! The services depend only on these traits; the in-memory registry and the
//! PostgreSQL persistence layer both implement them.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Booking, BookingId, BookingState, BookingStatus, DateRange, Yacht, YachtId};

/// Storage failure reported by a port implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store itself refused an overlapping active booking.
    #[error("overlapping active booking for yacht {0}")]
    Overlap(YachtId),

    /// A record with the same identifier already exists.
    #[error("duplicate booking {0}")]
    Duplicate(BookingId),

    /// Backend failure (connection, query, decoding).
    #[error("{0}")]
    Backend(String),
}

/// Filter for administrative booking listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingFilter {
    /// Only bookings of this yacht.
    pub yacht_id: Option<YachtId>,
    /// Only bookings in this status.
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    /// Returns `true` when the booking passes the filter.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        self.yacht_id.is_none_or(|id| booking.yacht_id == id)
            && self.status.is_none_or(|s| booking.status == s)
    }
}

/// One window of an administrative listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Matching bookings to skip.
    pub offset: u64,
    /// Maximum bookings to return.
    pub limit: u64,
}

impl PageRequest {
    /// Window for the 1-indexed `page` of `per_page` bookings.
    #[must_use]
    pub fn for_page(page: u32, per_page: u32) -> Self {
        Self {
            offset: u64::from(page.saturating_sub(1)) * u64::from(per_page),
            limit: u64::from(per_page),
        }
    }
}

/// Bookings in one [`PageRequest`] window plus the size of the full match.
#[derive(Debug, Clone, Default)]
pub struct BookingPage {
    /// Bookings in the window, newest first.
    pub bookings: Vec<Booking>,
    /// Number of bookings matching the filter across all pages.
    pub total: u64,
}

/// Durable booking records.
#[async_trait]
pub trait BookingStore: Send + Sync + Debug {
    /// Persists a newly admitted booking.
    ///
    /// Returns once the record is durable.
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Loads a booking by id.
    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Returns the `pending`/`confirmed` bookings of `yacht_id` overlapping `range`.
    async fn overlapping_active(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
    ) -> Result<Vec<Booking>, StoreError>;

    /// Writes the mutable fields of `booking` if the stored record is still
    /// in `expected` state.
    ///
    /// Returns `false` without writing when another writer got there first.
    async fn update_state(
        &self,
        booking: &Booking,
        expected: BookingState,
    ) -> Result<bool, StoreError>;

    /// Lists the `page` window of bookings matching `filter`, newest first.
    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<BookingPage, StoreError>;

    /// Returns unclaimed `pending/pending` bookings created before `cutoff`.
    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, StoreError>;
}

/// Read access to the fleet catalog.
#[async_trait]
pub trait YachtCatalog: Send + Sync + Debug {
    /// Looks up a yacht's rate and capacity.
    async fn get_yacht(&self, id: YachtId) -> Result<Option<Yacht>, StoreError>;
}
