//! Database rows for yachts and bookings.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Booking, DateRange, ParseStatusError, Pricing, StoreError, UserId, Yacht};

/// A row of the `yachts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct YachtRow {
    /// Catalog identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Price per night.
    pub daily_rate: Decimal,
    /// Maximum guests aboard.
    pub capacity: i32,
}

impl TryFrom<YachtRow> for Yacht {
    type Error = StoreError;

    fn try_from(row: YachtRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            daily_rate: row.daily_rate,
            capacity: u32::try_from(row.capacity)
                .map_err(|_| corrupt(row.id, "negative capacity"))?,
        })
    }
}

/// A row of the `bookings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    /// Booking identifier.
    pub id: Uuid,
    /// Reserved yacht.
    pub yacht_id: Uuid,
    /// Caller identity, `NULL` for guest checkout.
    pub guest_id: Option<String>,
    /// First night.
    pub start_date: NaiveDate,
    /// Checkout day, exclusive.
    pub end_date: NaiveDate,
    /// Guests aboard.
    pub guest_count: i32,
    /// Nights billed.
    pub nights: i64,
    /// Rate per night at admission.
    pub daily_rate: Decimal,
    /// `daily_rate * nights`.
    pub subtotal: Decimal,
    /// Fee rate at admission.
    pub service_fee_rate: Decimal,
    /// Service fee.
    pub service_fee: Decimal,
    /// Total price.
    pub total: Decimal,
    /// `card` or `crypto`.
    pub payment_method: String,
    /// Lifecycle status.
    pub status: String,
    /// Payment status.
    pub payment_status: String,
    /// Gateway transaction reference.
    pub external_payment_ref: Option<String>,
    /// Guest-reported crypto reference.
    pub claimed_payment_ref: Option<String>,
    /// Admission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let date_range = DateRange::new(row.start_date, row.end_date)
            .map_err(|e| corrupt(id, &e.to_string()))?;
        let guest_count =
            u32::try_from(row.guest_count).map_err(|_| corrupt(id, "negative guest count"))?;

        Ok(Self {
            id: id.into(),
            yacht_id: row.yacht_id.into(),
            guest_id: row.guest_id.map(UserId::new),
            date_range,
            guest_count,
            pricing: Pricing {
                nights: row.nights,
                daily_rate: row.daily_rate,
                subtotal: row.subtotal,
                service_fee_rate: row.service_fee_rate,
                service_fee: row.service_fee,
                total: row.total,
            },
            payment_method: row
                .payment_method
                .parse()
                .map_err(|e: ParseStatusError| corrupt(id, &e.to_string()))?,
            status: row
                .status
                .parse()
                .map_err(|e: ParseStatusError| corrupt(id, &e.to_string()))?,
            payment_status: row
                .payment_status
                .parse()
                .map_err(|e: ParseStatusError| corrupt(id, &e.to_string()))?,
            external_payment_ref: row.external_payment_ref,
            claimed_payment_ref: row.claimed_payment_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn corrupt(id: Uuid, what: &str) -> StoreError {
    StoreError::Backend(format!("corrupt row {id}: {what}"))
}
