//! Periodic expiry of abandoned checkouts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::BookingService;

/// Spawns a task that every `interval` cancels unpaid bookings older than
/// `max_age`.
pub fn spawn_expiry_sweeper(
    bookings: Arc<BookingService>,
    max_age: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now = bookings.clock().now();
            match bookings.expire_stale_pending(now, max_age).await {
                Ok(0) => tracing::debug!("expiry sweep found nothing"),
                Ok(expired) => tracing::info!(expired, "expiry sweep cancelled unpaid bookings"),
                Err(err) => tracing::warn!(error = %err, "expiry sweep failed"),
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{BookingStatus, BookingStore, FixedClock};
    use crate::service::test_support::{Fixture, frozen_now, range, request};

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_each_tick() {
        let fx = Fixture::new();
        let Ok(booking) = fx.admission.admit(request(&fx, range((7, 1), (7, 4)))).await else {
            panic!("admission failed");
        };

        // Same store, clock two hours later.
        let later = Arc::new(FixedClock(frozen_now() + chrono::Duration::hours(2)));
        let bookings = Arc::new(BookingService::new(
            Arc::clone(&fx.store) as Arc<dyn BookingStore>,
            fx.event_bus.clone(),
            later,
        ));
        let handle = spawn_expiry_sweeper(
            bookings,
            chrono::Duration::minutes(30),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        let Ok(after) = fx.bookings.get_booking(booking.id).await else {
            panic!("booking vanished");
        };
        assert_eq!(after.status, BookingStatus::Cancelled);
        handle.abort();
    }
}
