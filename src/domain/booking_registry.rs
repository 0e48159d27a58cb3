//! In-memory implementations of the storage ports.
//!
//! [`InMemoryBookingStore`] keeps every booking in a `HashMap` behind a
//! [`tokio::sync::RwLock`]. Like the PostgreSQL exclusion constraint, its
//! `insert` refuses a booking that overlaps an active one for the same
//! yacht, so the store never holds a double booking even if a caller skips
//! the admission lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::availability::find_conflicts;
use super::ports::{
    BookingFilter, BookingPage, BookingStore, PageRequest, StoreError, YachtCatalog,
};
use super::{
    Booking, BookingId, BookingState, BookingStatus, DateRange, PaymentStatus, Yacht, YachtId,
};

/// Process-local booking store.
///
/// # Concurrency
///
/// - Reads proceed concurrently.
/// - `insert` and `update_state` take the write lock, so each check-and-write
///   is atomic with respect to every other writer.
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<BookingId, Booking>>,
}

impl InMemoryBookingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Returns `true` if the store holds no bookings.
    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut map = self.bookings.write().await;
        if map.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(booking.id));
        }
        if booking.blocks_availability()
            && !find_conflicts(map.values(), booking.yacht_id, &booking.date_range, None).is_empty()
        {
            return Err(StoreError::Overlap(booking.yacht_id));
        }
        map.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn overlapping_active(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let map = self.bookings.read().await;
        Ok(map
            .values()
            .filter(|b| {
                b.yacht_id == yacht_id && b.blocks_availability() && b.date_range.overlaps(range)
            })
            .cloned()
            .collect())
    }

    async fn update_state(
        &self,
        booking: &Booking,
        expected: BookingState,
    ) -> Result<bool, StoreError> {
        let mut map = self.bookings.write().await;
        let Some(stored) = map.get_mut(&booking.id) else {
            return Ok(false);
        };
        if stored.state() != expected {
            return Ok(false);
        }
        stored.status = booking.status;
        stored.payment_status = booking.payment_status;
        stored.external_payment_ref.clone_from(&booking.external_payment_ref);
        stored.claimed_payment_ref.clone_from(&booking.claimed_payment_ref);
        stored.updated_at = booking.updated_at;
        Ok(true)
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<BookingPage, StoreError> {
        let map = self.bookings.read().await;
        let mut matching: Vec<&Booking> = map.values().filter(|b| filter.matches(b)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let bookings = matching.into_iter().skip(skip).take(take).cloned().collect();
        Ok(BookingPage { bookings, total })
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, StoreError> {
        let map = self.bookings.read().await;
        Ok(map
            .values()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && b.payment_status == PaymentStatus::Pending
                    && b.claimed_payment_ref.is_none()
                    && b.created_at < cutoff
            })
            .cloned()
            .collect())
    }
}

/// Process-local fleet catalog, seeded at startup.
#[derive(Debug, Default)]
pub struct InMemoryYachtCatalog {
    yachts: RwLock<HashMap<YachtId, Yacht>>,
}

impl InMemoryYachtCatalog {
    /// Creates a catalog holding `yachts`.
    #[must_use]
    pub fn with_yachts(yachts: impl IntoIterator<Item = Yacht>) -> Self {
        Self {
            yachts: RwLock::new(yachts.into_iter().map(|y| (y.id, y)).collect()),
        }
    }

    /// Adds or replaces a yacht.
    pub async fn upsert(&self, yacht: Yacht) {
        self.yachts.write().await.insert(yacht.id, yacht);
    }
}

#[async_trait]
impl YachtCatalog for InMemoryYachtCatalog {
    async fn get_yacht(&self, id: YachtId) -> Result<Option<Yacht>, StoreError> {
        Ok(self.yachts.read().await.get(&id).cloned())
    }
}
