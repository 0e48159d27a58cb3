//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod bookings;
pub mod payments;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(bookings::routes())
        .merge(payments::routes())
        .merge(admin::routes())
}
