//! Typed event bus
//!
//! Fan-out of message-part updates keyed by session id, over a tokio
//! broadcast channel. The execution core only subscribes; publishing is the
//! session store's job. Delivery is at-least-once in emission order, which
//! is why consumers upsert idempotently per call id.

use tokio::sync::broadcast;

use crate::session::model::Part;

/// Default buffer size for the broadcast channel
pub const BUS_CHANNEL_SIZE: usize = 256;

/// Events observable on the bus
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A message part was created or updated
    PartUpdated {
        session_id: String,
        message_id: String,
        part: Part,
    },
}

impl BusEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> &str {
        match self {
            BusEvent::PartUpdated { session_id, .. } => session_id,
        }
    }
}

/// Publish/subscribe hub for session events
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CHANNEL_SIZE);
        Self { tx }
    }

    /// Subscribe from this point forward
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; missing subscribers are fine
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of live subscriptions (used to verify scoped release)
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
