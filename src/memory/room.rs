//! Per-room message store, persisted as one `messages` record.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Event};

/// Everything the client keeps about one room's timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomMessages {
    pub room_id: String,
    /// Timeline events, oldest first.
    events: Vec<Event>,
    /// Token to back-paginate from the oldest stored event.
    pub pagination_token: Option<String>,
    pub notification_count: u32,
    pub highlight_count: u32,
    /// Back-pagination has reached the start of the room on the server.
    pub has_reached_pagination_end: bool,
    /// Draft text typed but not sent.
    pub partial_text_message: Option<String>,
    /// Messages queued for sending, in send order.
    outgoing_messages: Vec<Event>,
}

impl RoomMessages {
    /// Create an empty message store for a room.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Self::default()
        }
    }

    /// Number of timeline events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timeline events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Store an event at the end (live) or the start (back-pagination) of the timeline.
    pub fn store_event(&mut self, event: Event, direction: Direction) {
        match direction {
            Direction::Forwards => self.events.push(event),
            Direction::Backwards => self.events.insert(0, event),
        }
    }

    /// Replace the event with the same id. Returns false if it is not stored.
    pub fn replace_event(&mut self, event: Event) -> bool {
        match self
            .events
            .iter_mut()
            .find(|e| e.event_id == event.event_id)
        {
            Some(slot) => {
                *slot = event;
                true
            }
            None => false,
        }
    }

    /// Get an event by id.
    pub fn event_with_id(&self, event_id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.event_id == event_id)
    }

    /// Drop every timeline event and the pagination state that referred to them.
    pub fn remove_all_messages(&mut self) {
        self.events.clear();
        self.pagination_token = None;
        self.has_reached_pagination_end = false;
    }

    /// Most recent event whose type is in `types` (any type if `types` is empty).
    pub fn last_message(&self, types: &[&str]) -> Option<&Event> {
        self.events
            .iter()
            .rev()
            .find(|e| types.is_empty() || types.contains(&e.event_type.as_str()))
    }

    /// Events strictly after `event_id` whose type is in `types`.
    ///
    /// If `event_id` is not stored every matching event is returned.
    pub fn events_after(&self, event_id: Option<&str>, types: &[&str]) -> Vec<&Event> {
        let start = event_id
            .and_then(|id| self.events.iter().rposition(|e| e.event_id == id))
            .map(|pos| pos + 1)
            .unwrap_or(0);
        self.events[start..]
            .iter()
            .filter(|e| types.is_empty() || types.contains(&e.event_type.as_str()))
            .collect()
    }

    /// Messages waiting to be sent.
    pub fn outgoing_messages(&self) -> &[Event] {
        &self.outgoing_messages
    }

    /// Queue an outgoing message. A message with the same id is replaced in place.
    pub fn store_outgoing_message(&mut self, event: Event) {
        match self
            .outgoing_messages
            .iter_mut()
            .find(|e| e.event_id == event.event_id)
        {
            Some(slot) => *slot = event,
            None => self.outgoing_messages.push(event),
        }
    }

    /// Remove an outgoing message. Returns false if it was not queued.
    pub fn remove_outgoing_message(&mut self, event_id: &str) -> bool {
        let before = self.outgoing_messages.len();
        self.outgoing_messages.retain(|e| e.event_id != event_id);
        self.outgoing_messages.len() != before
    }

    pub fn remove_all_outgoing_messages(&mut self) {
        self.outgoing_messages.clear();
    }
}
