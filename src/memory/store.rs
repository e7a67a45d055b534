//! The live in-memory layer the application reads and writes during a session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::room::RoomMessages;
use crate::types::{Direction, Event, Receipt, ReceiptMap};

/// A room's receipts, shared with the background worker while they are written.
pub type SharedReceipts = Arc<Mutex<ReceiptMap>>;

/// Lock a receipt map. A poisoned lock still holds a usable map.
pub fn lock_receipts(receipts: &SharedReceipts) -> MutexGuard<'_, ReceiptMap> {
    match receipts.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory rooms, receipts and sync checkpoint.
#[derive(Default)]
pub struct MemoryStore {
    rooms: HashMap<String, RoomMessages>,
    receipts: HashMap<String, SharedReceipts>,
    event_stream_token: Option<String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every room with a message store.
    pub fn room_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomMessages> {
        self.rooms.get(room_id)
    }

    pub fn room_mut(&mut self, room_id: &str) -> Option<&mut RoomMessages> {
        self.rooms.get_mut(room_id)
    }

    /// Get a room's message store, creating an empty one if needed.
    ///
    /// The flag is true if the room was just created.
    pub fn get_or_create_room(&mut self, room_id: &str) -> (&mut RoomMessages, bool) {
        let created = !self.rooms.contains_key(room_id);
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomMessages::new(room_id));
        (room, created)
    }

    /// Install a room loaded from disk, replacing any existing one.
    pub fn insert_room(&mut self, room: RoomMessages) {
        self.rooms.insert(room.room_id.clone(), room);
    }

    pub fn store_event(&mut self, room_id: &str, event: Event, direction: Direction) {
        self.get_or_create_room(room_id).0.store_event(event, direction);
    }

    /// Replace a stored event. Returns false if the room or event is unknown.
    pub fn replace_event(&mut self, room_id: &str, event: Event) -> bool {
        self.rooms
            .get_mut(room_id)
            .is_some_and(|room| room.replace_event(event))
    }

    /// Look an event up in one room.
    pub fn event_with_id(&self, room_id: &str, event_id: &str) -> Option<&Event> {
        self.rooms.get(room_id)?.event_with_id(event_id)
    }

    pub fn delete_all_messages(&mut self, room_id: &str) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.remove_all_messages();
        }
    }

    /// Forget a room entirely, receipts included.
    pub fn delete_room(&mut self, room_id: &str) {
        self.rooms.remove(room_id);
        self.receipts.remove(room_id);
    }

    /// Forget everything, sync checkpoint included.
    pub fn delete_all_data(&mut self) {
        self.rooms.clear();
        self.receipts.clear();
        self.event_stream_token = None;
    }

    pub fn event_stream_token(&self) -> Option<&str> {
        self.event_stream_token.as_deref()
    }

    pub fn set_event_stream_token(&mut self, token: Option<String>) {
        self.event_stream_token = token;
    }

    /// The shared receipt map of a room, if any receipt was ever stored there.
    pub fn shared_receipts(&self, room_id: &str) -> Option<SharedReceipts> {
        self.receipts.get(room_id).cloned()
    }

    /// The shared receipt map of a room, created empty if needed.
    pub fn shared_receipts_or_default(&mut self, room_id: &str) -> SharedReceipts {
        self.receipts
            .entry(room_id.to_string())
            .or_default()
            .clone()
    }

    /// Install receipts loaded from disk.
    pub fn insert_receipts(&mut self, room_id: &str, receipts: ReceiptMap) {
        self.receipts
            .insert(room_id.to_string(), Arc::new(Mutex::new(receipts)));
    }

    /// Store a user's receipt. Only a receipt newer than the current one is
    /// accepted; returns whether the map changed.
    pub fn store_receipt(&mut self, room_id: &str, user_id: &str, receipt: Receipt) -> bool {
        let shared = self.shared_receipts_or_default(room_id);
        let mut map = lock_receipts(&shared);
        if let Some(current) = map.get(user_id) {
            if current.ts >= receipt.ts {
                return false;
            }
        }
        map.insert(user_id.to_string(), receipt);
        true
    }

    pub fn receipt(&self, room_id: &str, user_id: &str) -> Option<Receipt> {
        let shared = self.receipts.get(room_id)?;
        let map = lock_receipts(shared);
        map.get(user_id).cloned()
    }

    /// Users whose receipt in the room points at `event_id`.
    pub fn receipts_for_event(&self, room_id: &str, event_id: &str) -> Vec<(String, Receipt)> {
        let Some(shared) = self.receipts.get(room_id) else {
            return Vec::new();
        };
        let map = lock_receipts(shared);
        map.iter()
            .filter(|(_, r)| r.event_id == event_id)
            .map(|(user, r)| (user.clone(), r.clone()))
            .collect()
    }

    /// Events of the given types the user has not read yet, according to their receipt.
    pub fn unread_events(&self, room_id: &str, user_id: &str, types: &[&str]) -> Vec<&Event> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let last_read = self.receipt(room_id, user_id).map(|r| r.event_id);
        room.events_after(last_read.as_deref(), types)
            .into_iter()
            .filter(|e| e.sender != user_id)
            .collect()
    }
}
