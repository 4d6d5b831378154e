//! In-process change notifications.
//!
//! The engine announces what changed; it never knows or cares who listens.
//! UI layers subscribe to refresh the affected views.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::DateKey;

/// Everything the engine announces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Routine items were created, edited, or disabled.
    RoutinesChanged,
    /// A check was toggled on the given day.
    ChecksChanged { date: DateKey },
    /// The daily log (mode or workout flags) changed.
    DailyLogChanged { date: DateKey },
    ActivityLogged { date: DateKey },
    ActivityDeleted { date: DateKey },
    /// A streak freeze was consumed for the given day.
    FreezeConsumed { date: DateKey },
    /// A write went to the offline queue instead of the network.
    MutationQueued { pending: usize },
    /// A flush finished; `pending` is what remains queued.
    QueueFlushed { delivered: usize, pending: usize },
    /// The host asked for a full refresh (pull-to-refresh).
    RefreshRequested,
}

/// Broadcasts engine events to all subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: EngineEvent) {
        // Ignore errors — no subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let date = DateKey::parse("2025-03-03").unwrap();
        bus.emit(EngineEvent::ChecksChanged { date });
        assert_eq!(rx.recv().await.unwrap(), EngineEvent::ChecksChanged { date });
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.emit(EngineEvent::RoutinesChanged);
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.emit(EngineEvent::RefreshRequested);
        assert_eq!(a.recv().await.unwrap(), EngineEvent::RefreshRequested);
        assert_eq!(b.recv().await.unwrap(), EngineEvent::RefreshRequested);
    }
}
