//! Worker-side access to one user's store directory.
//!
//! Everything here does file I/O and is only ever called from jobs running
//! on the store's background worker.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::engine::preload::{lock_preload, SharedPreload};
use crate::format::file::{dir_size, remove_dir_if_exists};
use crate::format::paths::decode_component;
use crate::format::{read_record, write_record, ReadOutcome, Record, RecordCodec, StorePaths};
use crate::memory::RoomMessages;
use crate::types::error::{StoreError, StoreResult};
use crate::types::{Event, Metadata, ReceiptMap, RecordKind, RoomAccountData};

use super::open::WipeReason;

/// Rooms and receipts read back from disk.
#[derive(Debug, Default)]
pub struct LoadedRooms {
    pub rooms: Vec<RoomMessages>,
    pub receipts: HashMap<String, ReceiptMap>,
    pub states_preloaded: usize,
    pub account_data_preloaded: usize,
}

/// Paths, codec and write policy of one store.
pub struct DiskStore {
    paths: StorePaths,
    codec: Arc<dyn RecordCodec>,
    sync_writes: bool,
}

impl DiskStore {
    pub fn new(paths: StorePaths, codec: Arc<dyn RecordCodec>, sync_writes: bool) -> Self {
        Self {
            paths,
            codec,
            sync_writes,
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    fn read_typed<T>(
        &self,
        path: &std::path::Path,
        kind: RecordKind,
        extract: impl FnOnce(Record) -> Option<T>,
    ) -> ReadOutcome<T> {
        match read_record(path, kind, self.codec.as_ref()) {
            ReadOutcome::Loaded(record) => {
                let found = record.kind();
                match extract(record) {
                    Some(value) => ReadOutcome::Loaded(value),
                    None => ReadOutcome::Corrupt(StoreError::KindMismatch {
                        expected: kind,
                        found,
                    }),
                }
            }
            ReadOutcome::NotFound => ReadOutcome::NotFound,
            ReadOutcome::Corrupt(e) => ReadOutcome::Corrupt(e),
        }
    }

    pub fn load_metadata(&self) -> ReadOutcome<Metadata> {
        self.read_typed(&self.paths.metadata(), RecordKind::Metadata, |r| match r {
            Record::Metadata(m) => Some(m),
            _ => None,
        })
    }

    pub fn load_messages(&self, room_id: &str) -> ReadOutcome<RoomMessages> {
        let path = self.paths.room_record(room_id, RecordKind::Messages);
        match self.read_typed(&path, RecordKind::Messages, |r| match r {
            Record::Messages(m) => Some(m),
            _ => None,
        }) {
            ReadOutcome::Loaded(room) if room.room_id != room_id => {
                ReadOutcome::Corrupt(StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("messages of {} stored under {}", room.room_id, room_id),
                )))
            }
            outcome => outcome,
        }
    }

    pub fn load_state(&self, room_id: &str) -> ReadOutcome<Vec<Event>> {
        let path = self.paths.room_record(room_id, RecordKind::State);
        self.read_typed(&path, RecordKind::State, |r| match r {
            Record::State(s) => Some(s),
            _ => None,
        })
    }

    pub fn load_account_data(&self, room_id: &str) -> ReadOutcome<RoomAccountData> {
        let path = self.paths.room_record(room_id, RecordKind::AccountData);
        self.read_typed(&path, RecordKind::AccountData, |r| match r {
            Record::AccountData(a) => Some(a),
            _ => None,
        })
    }

    pub fn load_receipts(&self, room_id: &str) -> ReadOutcome<ReceiptMap> {
        let path = self.paths.room_record(room_id, RecordKind::Receipts);
        self.read_typed(&path, RecordKind::Receipts, |r| match r {
            Record::Receipts(m) => Some(m),
            _ => None,
        })
    }

    /// Write a room-scoped record.
    pub fn write_room_record(&self, room_id: &str, record: &Record) -> StoreResult<()> {
        let path = self.paths.room_record(room_id, record.kind());
        write_record(&path, record, self.codec.as_ref(), self.sync_writes)
    }

    pub fn write_metadata(&self, metadata: Metadata) -> StoreResult<()> {
        write_record(
            &self.paths.metadata(),
            &Record::Metadata(metadata),
            self.codec.as_ref(),
            self.sync_writes,
        )
    }

    /// Ids of every room directory on disk, sorted.
    pub fn room_ids_on_disk(&self) -> Result<Vec<String>, WipeReason> {
        let rooms_dir = self.paths.rooms_dir();
        let entries = match std::fs::read_dir(&rooms_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WipeReason::UnreadableRooms(e.to_string())),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WipeReason::UnreadableRooms(e.to_string()))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let id = name
                .to_str()
                .and_then(decode_component)
                .ok_or_else(|| {
                    WipeReason::UnreadableRooms(format!("bad room directory {:?}", name))
                })?;
            ids.push(id);
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Load every room, preload its state and account data, then its receipts.
    ///
    /// Any corrupt record, or a room directory count that disagrees with what
    /// was loaded, condemns the whole store.
    pub fn load_rooms(&self, preload: &SharedPreload) -> Result<LoadedRooms, WipeReason> {
        let room_ids = self.room_ids_on_disk()?;
        let mut loaded = LoadedRooms::default();

        for room_id in &room_ids {
            match self.load_messages(room_id) {
                ReadOutcome::Loaded(room) => loaded.rooms.push(room),
                ReadOutcome::NotFound => {
                    log::warn!("room directory {} has no messages record", room_id)
                }
                ReadOutcome::Corrupt(e) => {
                    return Err(corrupt(room_id, RecordKind::Messages, e));
                }
            }
        }

        for room in &loaded.rooms {
            let room_id = room.room_id.as_str();
            if self.preload_state(room_id, preload)? {
                loaded.states_preloaded += 1;
            }
            if self.preload_account_data(room_id, preload)? {
                loaded.account_data_preloaded += 1;
            }
        }

        for room in &loaded.rooms {
            match self.load_receipts(&room.room_id) {
                ReadOutcome::Loaded(map) => {
                    loaded.receipts.insert(room.room_id.clone(), map);
                }
                ReadOutcome::NotFound => {}
                ReadOutcome::Corrupt(e) => {
                    return Err(corrupt(&room.room_id, RecordKind::Receipts, e));
                }
            }
        }

        if room_ids.len() != loaded.rooms.len() || loaded.receipts.len() != loaded.rooms.len() {
            return Err(WipeReason::RoomCountMismatch {
                room_dirs: room_ids.len(),
                rooms_loaded: loaded.rooms.len(),
                receipts_loaded: loaded.receipts.len(),
            });
        }
        Ok(loaded)
    }

    /// Decode a room's state into the preload cache. Returns whether there was any.
    pub fn preload_state(&self, room_id: &str, preload: &SharedPreload) -> Result<bool, WipeReason> {
        match self.load_state(room_id) {
            ReadOutcome::Loaded(state) => {
                lock_preload(preload).insert_state(room_id, state);
                Ok(true)
            }
            ReadOutcome::NotFound => Ok(false),
            ReadOutcome::Corrupt(e) => Err(corrupt(room_id, RecordKind::State, e)),
        }
    }

    /// Decode a room's account data into the preload cache. Returns whether there was any.
    pub fn preload_account_data(
        &self,
        room_id: &str,
        preload: &SharedPreload,
    ) -> Result<bool, WipeReason> {
        match self.load_account_data(room_id) {
            ReadOutcome::Loaded(data) => {
                lock_preload(preload).insert_account_data(room_id, data);
                Ok(true)
            }
            ReadOutcome::NotFound => Ok(false),
            ReadOutcome::Corrupt(e) => Err(corrupt(room_id, RecordKind::AccountData, e)),
        }
    }

    /// Room state for a caller: preloaded copy if still cached, else a fresh decode.
    pub fn state_on_demand(&self, room_id: &str, preload: &SharedPreload) -> Option<Vec<Event>> {
        if let Some(state) = lock_preload(preload).take_state(room_id) {
            log::debug!("state of {} served from preload cache", room_id);
            return Some(state);
        }
        match self.load_state(room_id) {
            ReadOutcome::Loaded(state) => Some(state),
            ReadOutcome::NotFound => None,
            ReadOutcome::Corrupt(e) => {
                log::warn!("state of {} is unreadable: {}", room_id, e);
                None
            }
        }
    }

    /// Room account data for a caller: preloaded copy if still cached, else a fresh decode.
    pub fn account_data_on_demand(
        &self,
        room_id: &str,
        preload: &SharedPreload,
    ) -> Option<RoomAccountData> {
        if let Some(data) = lock_preload(preload).take_account_data(room_id) {
            log::debug!("account data of {} served from preload cache", room_id);
            return Some(data);
        }
        match self.load_account_data(room_id) {
            ReadOutcome::Loaded(data) => Some(data),
            ReadOutcome::NotFound => None,
            ReadOutcome::Corrupt(e) => {
                log::warn!("account data of {} is unreadable: {}", room_id, e);
                None
            }
        }
    }

    pub fn delete_room_data(&self, room_id: &str) -> io::Result<()> {
        remove_dir_if_exists(&self.paths.room_dir(room_id))
    }

    /// Full wipe: remove everything, leave an empty store directory behind.
    pub fn wipe(&self) -> io::Result<()> {
        remove_dir_if_exists(self.paths.store_dir())?;
        std::fs::create_dir_all(self.paths.rooms_dir())
    }

    /// Bytes used by this store on disk.
    pub fn disk_usage(&self) -> u64 {
        match dir_size(self.paths.store_dir()) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("cannot compute disk usage: {}", e);
                0
            }
        }
    }
}

fn corrupt(room_id: &str, kind: RecordKind, err: StoreError) -> WipeReason {
    log::warn!("{} record of {} is corrupt: {}", kind, room_id, err);
    WipeReason::CorruptRecord {
        room_id: room_id.to_string(),
        kind,
    }
}
