//! PostgreSQL implementation of the storage ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{BookingRow, YachtRow};
use crate::domain::{
    Booking, BookingEvent, BookingFilter, BookingId, BookingPage, BookingState, BookingStore,
    DateRange, PageRequest, StoreError, Yacht, YachtCatalog, YachtId,
};
use crate::service::EventSink;

const BOOKING_COLUMNS: &str = "id, yacht_id, guest_id, start_date, end_date, guest_count, nights, \
     daily_rate, subtotal, service_fee_rate, service_fee, total, payment_method, status, \
     payment_status, external_payment_ref, claimed_payment_ref, created_at, updated_at";

/// SQLSTATE `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// The `bookings_no_overlap` exclusion constraint refuses overlapping
/// active bookings, so several gateway processes can share one database
/// without double-booking.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or updates a fleet entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on database failure.
    pub async fn upsert_yacht(&self, yacht: &Yacht) -> Result<(), StoreError> {
        let capacity = i32::try_from(yacht.capacity)
            .map_err(|_| StoreError::Backend(format!("capacity out of range: {}", yacht.capacity)))?;
        sqlx::query(
            "INSERT INTO yachts (id, name, daily_rate, capacity) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             daily_rate = EXCLUDED.daily_rate, capacity = EXCLUDED.capacity",
        )
        .bind(yacht.id.as_uuid())
        .bind(&yacht.name)
        .bind(yacht.daily_rate)
        .bind(capacity)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Appends an event to the audit log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on database failure.
    pub async fn save_event(
        &self,
        booking_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO booking_events (booking_id, event_type, payload) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(booking_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn fetch_bookings(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, BookingRow, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Booking>, StoreError> {
        query
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let guest_count = i32::try_from(booking.guest_count)
            .map_err(|_| StoreError::Backend("guest count out of range".to_string()))?;

        let sql = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        );
        sqlx::query(&sql)
            .bind(booking.id.as_uuid())
            .bind(booking.yacht_id.as_uuid())
            .bind(booking.guest_id.as_ref().map(|g| g.as_str()))
            .bind(booking.date_range.start())
            .bind(booking.date_range.end())
            .bind(guest_count)
            .bind(booking.pricing.nights)
            .bind(booking.pricing.daily_rate)
            .bind(booking.pricing.subtotal)
            .bind(booking.pricing.service_fee_rate)
            .bind(booking.pricing.service_fee)
            .bind(booking.pricing.total)
            .bind(booking.payment_method.as_str())
            .bind(booking.status.as_str())
            .bind(booking.payment_status.as_str())
            .bind(booking.external_payment_ref.as_deref())
            .bind(booking.claimed_payment_ref.as_deref())
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|err| match db_code(&err).as_deref() {
                Some(EXCLUSION_VIOLATION) => StoreError::Overlap(booking.yacht_id),
                Some(UNIQUE_VIOLATION) => StoreError::Duplicate(booking.id),
                _ => backend(err),
            })?;
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(Booking::try_from)
            .transpose()
    }

    async fn overlapping_active(
        &self,
        yacht_id: YachtId,
        range: &DateRange,
    ) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE yacht_id = $1 AND status IN ('pending', 'confirmed') \
             AND start_date < $3 AND $2 < end_date ORDER BY start_date"
        );
        self.fetch_bookings(
            sqlx::query_as::<_, BookingRow>(&sql)
                .bind(*yacht_id.as_uuid())
                .bind(range.start())
                .bind(range.end()),
        )
        .await
    }

    async fn update_state(
        &self,
        booking: &Booking,
        expected: BookingState,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $1, payment_status = $2, external_payment_ref = $3, \
             claimed_payment_ref = $4, updated_at = $5 \
             WHERE id = $6 AND status = $7 AND payment_status = $8",
        )
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.external_payment_ref.as_deref())
        .bind(booking.claimed_payment_ref.as_deref())
        .bind(booking.updated_at)
        .bind(booking.id.as_uuid())
        .bind(expected.status.as_str())
        .bind(expected.payment_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<BookingPage, StoreError> {
        const FILTER: &str =
            "WHERE ($1::uuid IS NULL OR yacht_id = $1) AND ($2::text IS NULL OR status = $2)";
        let yacht_id = filter.yacht_id.map(|id| *id.as_uuid());
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM bookings {FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(yacht_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings {FILTER} \
             ORDER BY created_at DESC, id LIMIT $3 OFFSET $4"
        );
        let bookings = self
            .fetch_bookings(
                sqlx::query_as::<_, BookingRow>(&sql)
                    .bind(yacht_id)
                    .bind(status)
                    .bind(i64::try_from(page.limit).unwrap_or(i64::MAX))
                    .bind(i64::try_from(page.offset).unwrap_or(i64::MAX)),
            )
            .await?;

        Ok(BookingPage {
            bookings,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, StoreError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE status = 'pending' AND payment_status = 'pending' \
               AND claimed_payment_ref IS NULL AND created_at < $1 \
             ORDER BY created_at"
        );
        self.fetch_bookings(sqlx::query_as::<_, BookingRow>(&sql).bind(cutoff))
            .await
    }
}

#[async_trait]
impl YachtCatalog for PostgresStore {
    async fn get_yacht(&self, id: YachtId) -> Result<Option<Yacht>, StoreError> {
        sqlx::query_as::<_, YachtRow>(
            "SELECT id, name, daily_rate, capacity FROM yachts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .map(Yacht::try_from)
        .transpose()
    }
}

#[async_trait]
impl EventSink for PostgresStore {
    async fn record(&self, event: &BookingEvent) -> Result<(), StoreError> {
        let payload =
            serde_json::to_value(event).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.save_event(*event.booking_id().as_uuid(), event.event_type_str(), &payload)
            .await?;
        Ok(())
    }
}

fn db_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
