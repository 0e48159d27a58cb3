//! Pricing engine: flat daily rate plus a fixed service fee.
//!
//! Prices are computed once at admission and persisted with the booking.
//! Everything here is pure [`Decimal`] arithmetic so that an auditor can
//! recompute a stored price and get the identical result.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DateRange;

/// Service fee charged on top of the subtotal (10%).
pub const SERVICE_FEE_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Decimal places of the currency's minor unit.
pub const MINOR_UNIT_SCALE: u32 = 2;

const MINOR_UNITS_PER_MAJOR: Decimal = Decimal::ONE_HUNDRED;

/// Errors raised by the pricing engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// Checkout date is not after the check-in date.
    #[error("invalid range: end {end} must be after start {start}")]
    InvalidRange {
        /// Requested check-in date.
        start: NaiveDate,
        /// Requested checkout date.
        end: NaiveDate,
    },

    /// Daily rate is not a positive amount in the currency's minor unit.
    #[error("invalid daily rate: {0}")]
    InvalidRate(Decimal),

    /// Result does not fit in the decimal representation.
    #[error("price overflow")]
    Overflow,
}

/// Authoritative price of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pricing {
    /// Number of nights billed.
    pub nights: i64,
    /// Rate per night.
    pub daily_rate: Decimal,
    /// `daily_rate * nights`.
    pub subtotal: Decimal,
    /// Fee rate applied to the subtotal.
    pub service_fee_rate: Decimal,
    /// Fee rounded half-up to the minor unit.
    pub service_fee: Decimal,
    /// `subtotal + service_fee`.
    pub total: Decimal,
}

impl Pricing {
    /// Returns the total in the currency's minor unit (e.g. cents).
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the amount does not fit in `i64`.
    pub fn total_minor_units(&self) -> Result<i64, PricingError> {
        self.total
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|minor| minor.to_i64())
            .ok_or(PricingError::Overflow)
    }
}

/// Prices a stay over an already validated range.
///
/// # Errors
///
/// Returns [`PricingError::InvalidRate`] for a non-positive rate or one
/// finer than the minor unit, and [`PricingError::Overflow`] when the
/// amounts exceed the decimal range.
pub fn price(daily_rate: Decimal, range: &DateRange) -> Result<Pricing, PricingError> {
    if daily_rate <= Decimal::ZERO || daily_rate.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(PricingError::InvalidRate(daily_rate));
    }

    let nights = range.nights();
    let subtotal = daily_rate
        .checked_mul(Decimal::from(nights))
        .ok_or(PricingError::Overflow)?;
    let service_fee = subtotal
        .checked_mul(SERVICE_FEE_RATE)
        .ok_or(PricingError::Overflow)?
        .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    let total = subtotal
        .checked_add(service_fee)
        .ok_or(PricingError::Overflow)?;

    Ok(Pricing {
        nights,
        daily_rate,
        subtotal,
        service_fee_rate: SERVICE_FEE_RATE,
        service_fee,
        total,
    })
}

/// Prices a stay from raw dates.
///
/// # Errors
///
/// Returns [`PricingError::InvalidRange`] unless `end > start`, plus every
/// error of [`price`].
pub fn price_dates(
    daily_rate: Decimal,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Pricing, PricingError> {
    let range = DateRange::new(start, end).map_err(|e| PricingError::InvalidRange {
        start: e.start,
        end: e.end,
    })?;
    price(daily_rate, &range)
}
