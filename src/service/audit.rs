//! Audit recorder: drains the [`EventBus`] into the log and an optional
//! durable sink.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::domain::{BookingEvent, EventBus, StoreError};

/// Durable destination for booking events.
#[async_trait]
pub trait EventSink: Send + Sync + Debug {
    /// Appends one event to the audit log.
    async fn record(&self, event: &BookingEvent) -> Result<(), StoreError>;
}

/// Spawns a task that records every event published on `event_bus`.
///
/// The task ends when the bus is dropped. A lagging recorder logs how many
/// events it missed and carries on.
pub fn spawn_event_recorder(
    event_bus: &EventBus,
    sink: Option<Arc<dyn EventSink>>,
) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    tracing::debug!(
                        booking_id = %event.booking_id(),
                        event_type = event.event_type_str(),
                        "booking event"
                    );
                    let Some(sink) = &sink else {
                        continue;
                    };
                    if let Err(err) = sink.record(&event).await {
                        tracing::error!(
                            booking_id = %event.booking_id(),
                            event_type = event.event_type_str(),
                            error = %err,
                            "failed to persist booking event"
                        );
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "audit recorder lagged, events not recorded");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
