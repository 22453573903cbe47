//! Outbound transfer events
//!
//! Publishing never fails from the caller's point of view: a missing or lagging
//! subscriber must not affect a committed transfer.

use shared::TransferEvent;
use tokio::sync::broadcast;

/// Receiver of events from committed transfer changes
pub trait EventSink: Send + Sync {
    fn publish(&self, event: TransferEvent);

    fn publish_all(&self, events: Vec<TransferEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

/// Fan-out over a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<TransferEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: TransferEvent) {
        tracing::info!(event = event.name(), payload = ?event, "Transfer event");
        if self.sender.send(event).is_err() {
            tracing::debug!("No event subscribers");
        }
    }
}
