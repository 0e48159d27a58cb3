//! Half-open calendar date ranges.
//!
//! A [`DateRange`] `[start, end)` excludes its end date, so a checkout day
//! may equal the next guest's check-in day without the two ranges
//! overlapping.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error raised when a date range is empty or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid date range: end {end} must be after start {start}")]
pub struct InvalidRange {
    /// Requested first night.
    pub start: NaiveDate,
    /// Requested checkout date.
    pub end: NaiveDate,
}

/// Half-open range of calendar dates with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    /// Check-in date (first night).
    #[schema(value_type = String, format = Date)]
    start: NaiveDate,
    /// Checkout date (not a night of the stay).
    #[schema(value_type = String, format = Date)]
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting empty or inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRange`] unless `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(InvalidRange { start, end })
        }
    }

    /// Check-in date.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Checkout date.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of nights covered, always at least one.
    #[must_use]
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Returns `true` when the two ranges share at least one night.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = InvalidRange;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}
