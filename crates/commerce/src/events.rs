//! Notification sink and change signal.
//!
//! A single broadcast channel carries both user-facing notifications and
//! lightweight "collection changed" signals. Observers (a cart badge, a toast
//! renderer) subscribe; the stores never block on them.

use kaline_core::{Collection, NoticeLevel, Notification};
use tokio::sync::broadcast;

/// Default channel capacity. Lagging subscribers skip the oldest events.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// An event emitted by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Something the user should be told about.
    Notice(Notification),
    /// The visible contents of a collection changed.
    Changed(Collection),
}

/// Broadcast bus shared by all stores of a session.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Emit a notification. Also written to the log.
    pub fn notify(&self, notification: Notification) {
        match notification.level {
            NoticeLevel::Error => tracing::warn!(
                title = %notification.title,
                cause = ?notification.cause,
                "{}",
                notification.message
            ),
            NoticeLevel::Info | NoticeLevel::Success => tracing::debug!(
                title = %notification.title,
                "{}",
                notification.message
            ),
        }
        // No subscribers is fine
        let _ = self.sender.send(StoreEvent::Notice(notification));
    }

    /// Signal that a collection changed.
    pub fn changed(&self, collection: Collection) {
        tracing::trace!(%collection, "collection changed");
        let _ = self.sender.send(StoreEvent::Changed(collection));
    }
}

/// Drain every event currently buffered in `receiver`.
///
/// Lagged events are skipped.
pub fn drain(receiver: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event subscriber lagged");
            }
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                break;
            }
        }
    }
    events
}
