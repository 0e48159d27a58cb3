//! Availability checks for a yacht over a date range.
//!
//! [`find_conflicts`] is the single definition of "these dates are taken":
//! only `pending` and `confirmed` bookings of the same yacht block, and
//! ranges are compared half-open. [`AvailabilityChecker`] applies it to
//! whatever the store returns. A read here does not reserve anything; the
//! admission controller repeats the check inside its per-yacht lock.

use std::sync::Arc;

use super::ports::{BookingStore, StoreError};
use super::{Booking, BookingId, DateRange, YachtId};

/// Returns the ranges of active bookings that overlap `range`, sorted by
/// start date.
pub fn find_conflicts<'a, I>(
    bookings: I,
    yacht_id: YachtId,
    range: &DateRange,
    exclude: Option<BookingId>,
) -> Vec<DateRange>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut conflicts: Vec<DateRange> = bookings
        .into_iter()
        .filter(|b| b.yacht_id == yacht_id)
        .filter(|b| b.blocks_availability())
        .filter(|b| Some(b.id) != exclude)
        .filter(|b| b.date_range.overlaps(range))
        .map(|b| b.date_range)
        .collect();
    conflicts.sort_by_key(DateRange::start);
    conflicts.dedup();
    conflicts
}

/// Store-backed availability lookups.
#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityChecker {
    /// Creates a checker reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Returns the conflicting ranges for `range` on `yacht_id`.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`StoreError`].
    pub async fn conflicts(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
    ) -> Result<Vec<DateRange>, StoreError> {
        self.conflicts_excluding(yacht_id, range, None).await
    }

    /// Returns `true` when no other active booking overlaps `range`.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`StoreError`].
    pub async fn is_available(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .conflicts_excluding(yacht_id, range, exclude)
            .await?
            .is_empty())
    }

    async fn conflicts_excluding(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> Result<Vec<DateRange>, StoreError> {
        let candidates = self.store.overlapping_active(yacht_id, range).await?;
        Ok(find_conflicts(&candidates, yacht_id, range, exclude))
    }
}
