//! Dirty tracking: which rooms changed since the last commit.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Event, RoomAccountData};

/// The four dirty sets, owned by the caller's thread between commits.
///
/// Every set is keyed by room id, so marking a room twice is a no-op.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    messages: BTreeSet<String>,
    state: BTreeMap<String, Vec<Event>>,
    account_data: BTreeMap<String, RoomAccountData>,
    receipts: BTreeSet<String>,
}

/// Captured contents of the dirty sets at the start of a commit.
#[derive(Debug, Default, PartialEq)]
pub struct DirtySnapshot {
    pub messages: BTreeSet<String>,
    pub state: BTreeMap<String, Vec<Event>>,
    pub account_data: BTreeMap<String, RoomAccountData>,
    pub receipts: BTreeSet<String>,
}

impl DirtySnapshot {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.state.is_empty()
            && self.account_data.is_empty()
            && self.receipts.is_empty()
    }
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_messages(&mut self, room_id: &str) {
        self.messages.insert(room_id.to_string());
    }

    /// Record a state replacement; a later one in the same cycle wins.
    pub fn mark_state(&mut self, room_id: &str, state: Vec<Event>) {
        self.state.insert(room_id.to_string(), state);
    }

    /// Record an account data replacement; a later one in the same cycle wins.
    pub fn mark_account_data(&mut self, room_id: &str, account_data: RoomAccountData) {
        self.account_data.insert(room_id.to_string(), account_data);
    }

    pub fn mark_receipts(&mut self, room_id: &str) {
        self.receipts.insert(room_id.to_string());
    }

    /// State stored since the last commit, not yet handed to the worker.
    pub fn pending_state(&self, room_id: &str) -> Option<&Vec<Event>> {
        self.state.get(room_id)
    }

    /// Account data stored since the last commit, not yet handed to the worker.
    pub fn pending_account_data(&self, room_id: &str) -> Option<&RoomAccountData> {
        self.account_data.get(room_id)
    }

    /// Drop every pending change of a deleted room.
    pub fn forget_room(&mut self, room_id: &str) {
        self.messages.remove(room_id);
        self.state.remove(room_id);
        self.account_data.remove(room_id);
        self.receipts.remove(room_id);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.state.is_empty()
            && self.account_data.is_empty()
            && self.receipts.is_empty()
    }

    /// Capture and clear all sets in one step.
    pub fn take(&mut self) -> DirtySnapshot {
        DirtySnapshot {
            messages: std::mem::take(&mut self.messages),
            state: std::mem::take(&mut self.state),
            account_data: std::mem::take(&mut self.account_data),
            receipts: std::mem::take(&mut self.receipts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marking_is_idempotent() {
        let mut dirty = DirtyTracker::new();
        for _ in 0..5 {
            dirty.mark_messages("!a");
            dirty.mark_receipts("!a");
        }
        dirty.mark_messages("!b");
        let snapshot = dirty.take();
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(snapshot.receipts.len(), 1);
        assert!(dirty.is_empty());
    }

    #[test]
    fn test_latest_payload_wins() {
        let mut dirty = DirtyTracker::new();
        dirty.mark_state("!a", vec![Event::new("$1", "m.room.name", "@x").with_state_key("")]);
        dirty.mark_state("!a", Vec::new());
        assert_eq!(dirty.pending_state("!a"), Some(&Vec::new()));
        assert_eq!(dirty.take().state.len(), 1);
    }

    #[test]
    fn test_forget_room() {
        let mut dirty = DirtyTracker::new();
        dirty.mark_messages("!a");
        dirty.mark_account_data("!a", RoomAccountData::new());
        dirty.mark_receipts("!b");
        dirty.forget_room("!a");
        let snapshot = dirty.take();
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.account_data.is_empty());
        assert!(snapshot.receipts.contains("!b"));
    }
}
