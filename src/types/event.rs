//! Room events, read receipts and room account data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::now_millis;

/// A single room event, either from the timeline or from the room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned event identifier (or a local echo id for outgoing messages).
    pub event_id: String,
    /// Event type, e.g. `m.room.message`.
    pub event_type: String,
    /// Sender user id.
    pub sender: String,
    /// State key, present only on state events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Origin server timestamp (Unix epoch milliseconds).
    pub origin_server_ts: u64,
    /// Event content, opaque to the store.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Event {
    /// Create a timeline event with empty content, stamped now.
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            sender: sender.into(),
            state_key: None,
            origin_server_ts: now_millis(),
            content: serde_json::Value::Null,
        }
    }

    /// Set the content.
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// Turn this into a state event with the given state key.
    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    /// Set the origin server timestamp.
    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.origin_server_ts = ts;
        self
    }
}

/// Where a timeline event goes relative to the events already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Live event, appended at the end.
    Forwards,
    /// Back-paginated event, inserted at the start.
    Backwards,
}

/// A read receipt of one user in one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The event the user has read up to.
    pub event_id: String,
    /// When the receipt was sent (Unix epoch milliseconds).
    pub ts: u64,
}

impl Receipt {
    pub fn new(event_id: impl Into<String>, ts: u64) -> Self {
        Self {
            event_id: event_id.into(),
            ts,
        }
    }
}

/// Receipts of a room, keyed by user id.
pub type ReceiptMap = BTreeMap<String, Receipt>;

/// Room-scoped account data (tags, read markers, ...), keyed by event type.
///
/// Replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAccountData {
    pub events: BTreeMap<String, serde_json::Value>,
}

impl RoomAccountData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one account data event.
    pub fn with(mut self, event_type: impl Into<String>, content: serde_json::Value) -> Self {
        self.events.insert(event_type.into(), content);
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&serde_json::Value> {
        self.events.get(event_type)
    }
}
