//! Event types for the Keybed event system
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What happened to the compared set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareChangeKind {
    Added,
    Removed,
    Cleared,
}

/// Admin-side catalog mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentAction {
    Created,
    Updated,
    Deleted,
    DetailsUpdated,
}

/// Keybed event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KeybedEvent {
    /// The compared set was mutated
    ///
    /// Triggers:
    /// - SSE: clients replace their current history entry with `route`
    CompareSetChanged {
        change: CompareChangeKind,
        /// Item added or removed (None for clear)
        item_id: Option<String>,
        /// Full ordered set after the change
        item_ids: Vec<String>,
        /// Canonical shareable route for the new set
        route: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A catalog record was created, updated or deleted through the admin API
    InstrumentChanged {
        instrument_id: String,
        action: InstrumentAction,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl KeybedEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            KeybedEvent::CompareSetChanged { .. } => "CompareSetChanged",
            KeybedEvent::InstrumentChanged { .. } => "InstrumentChanged",
        }
    }
}

/// Broadcast bus for [`KeybedEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KeybedEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<KeybedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: KeybedEvent,
    ) -> Result<usize, broadcast::error::SendError<KeybedEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KeybedEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
