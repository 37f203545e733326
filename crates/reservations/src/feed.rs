use shared::protocol::ServerEvent;
use tokio::sync::broadcast;

/// Fan-out of reservation changes to every mounted admin console.
#[derive(Clone)]
pub struct ChangeFeed {
    events: broadcast::Sender<ServerEvent>,
}

impl ChangeFeed {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events }
    }

    /// Publishing with nobody subscribed is not an error.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
