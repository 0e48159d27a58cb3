//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// Maximum page size for list endpoints.
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    20
}

/// Clamps a requested page to `page >= 1` and `per_page` in `1..=MAX_PER_PAGE`.
#[must_use]
pub fn clamp_page(page: u32, per_page: u32) -> (u32, u32) {
    (page.max(1), per_page.clamp(1, MAX_PER_PAGE))
}

impl PaginationMeta {
    /// Metadata for `page` of `per_page` items out of `total`.
    #[must_use]
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page.max(1)),
        }
    }
}
