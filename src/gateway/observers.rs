//! Observer hub: fire-and-forget push notifications for dashboards.

use tokio::sync::broadcast;
use tracing::trace;
use wabridge_core::message::{ObserverEvent, Severity};

/// Buffered events per subscriber before the slowest one starts lagging.
const OBSERVER_CAPACITY: usize = 64;

/// Broadcast hub for [`ObserverEvent`]s. Cloning shares the hub.
#[derive(Clone)]
pub struct Observers {
    tx: broadcast::Sender<ObserverEvent>,
}

impl Observers {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ObserverEvent) {
        trace!("observer event: {}", event.name());
        let _ = self.tx.send(event);
    }

    pub fn status(&self, severity: Severity, text: impl Into<String>) {
        self.publish(ObserverEvent::status(severity, text));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.tx.subscribe()
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}
