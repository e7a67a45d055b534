//! Single-use cache filled while opening, so first reads after open skip the disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{Event, RoomAccountData};

/// Decoded room state and account data, each entry handed out at most once.
#[derive(Debug, Default)]
pub struct PreloadCache {
    states: HashMap<String, Vec<Event>>,
    account_data: HashMap<String, RoomAccountData>,
}

/// The cache as shared between the store and its worker.
pub type SharedPreload = Arc<Mutex<PreloadCache>>;

/// Lock the shared cache. A poisoned lock still holds a usable cache.
pub fn lock_preload(cache: &SharedPreload) -> MutexGuard<'_, PreloadCache> {
    match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_state(&mut self, room_id: &str, state: Vec<Event>) {
        self.states.insert(room_id.to_string(), state);
    }

    /// Remove and return a room's preloaded state.
    pub fn take_state(&mut self, room_id: &str) -> Option<Vec<Event>> {
        self.states.remove(room_id)
    }

    pub fn insert_account_data(&mut self, room_id: &str, account_data: RoomAccountData) {
        self.account_data.insert(room_id.to_string(), account_data);
    }

    /// Remove and return a room's preloaded account data.
    pub fn take_account_data(&mut self, room_id: &str) -> Option<RoomAccountData> {
        self.account_data.remove(room_id)
    }

    pub fn evict_state(&mut self, room_id: &str) {
        self.states.remove(room_id);
    }

    pub fn evict_account_data(&mut self, room_id: &str) {
        self.account_data.remove(room_id);
    }

    pub fn evict_room(&mut self, room_id: &str) {
        self.evict_state(room_id);
        self.evict_account_data(room_id);
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.account_data.clear();
    }
}
