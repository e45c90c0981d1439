//! In-process domain-event bus.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::DomainEvent;

/// Number of events buffered per subscriber before it starts lagging.
pub const DOMAIN_EVENTS_CAPACITY: usize = 256;

/// Broadcast hub carrying the single domain-events channel.
///
/// Every subscriber gets its own ordered receiver; delivery within one
/// subscription matches publish order, and a slow subscriber that lags past
/// the buffer skips the missed events rather than stalling the publishers.
pub struct EventHub {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventHub {
    /// Construct a hub backed by a broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// An event published while nobody is subscribed is dropped; that is the
    /// expected steady-state before the first consumer attaches.
    pub fn publish(&self, event: DomainEvent) {
        if self.sender.send(event).is_err() {
            debug!("domain event published with no active subscribers");
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DOMAIN_EVENTS_CAPACITY)
    }
}
