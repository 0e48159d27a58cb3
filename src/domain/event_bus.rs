//! Broadcast channel for booking events.
//!
//! Services publish a [`BookingEvent`] after each committed mutation, never
//! while holding a yacht lock. The audit recorder and tests subscribe.

use tokio::sync::broadcast;

use super::BookingEvent;

/// Fan-out of [`BookingEvent`]s over a `tokio::broadcast` ring buffer.
///
/// Lagging receivers lose the oldest events; the recorder logs the gap.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BookingEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event` and returns how many receivers got it.
    ///
    /// Publishing never fails: a booking mutation is already committed when
    /// its event goes out.
    pub fn publish(&self, event: BookingEvent) -> usize {
        let event_type = event.event_type_str();
        let booking_id = event.booking_id();
        match self.sender.send(event) {
            Ok(delivered) => {
                tracing::trace!(event_type, %booking_id, delivered, "booking event published");
                delivered
            }
            Err(_) => {
                tracing::debug!(event_type, %booking_id, "booking event dropped: no subscribers");
                0
            }
        }
    }

    /// Receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers; the health endpoint reports it.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
