//! Read-only yacht data consumed from the fleet catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::YachtId;

/// The slice of a catalog yacht that admission needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Yacht {
    /// Catalog identifier.
    pub id: YachtId,
    /// Display name, used in logs only.
    #[serde(default)]
    pub name: String,
    /// Price per night.
    pub daily_rate: Decimal,
    /// Maximum number of guests aboard.
    pub capacity: u32,
}
