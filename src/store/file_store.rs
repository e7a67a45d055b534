//! The file store: in-memory room layer plus durable, crash-safe persistence.

use std::sync::Arc;

use crate::engine::dirty::DirtyTracker;
use crate::engine::marker::CrashGuard;
use crate::engine::preload::{lock_preload, PreloadCache, SharedPreload};
use crate::engine::worker::{Completion, Worker};
use crate::format::StorePaths;
use crate::memory::{MemoryStore, RoomMessages};
use crate::types::error::StoreResult;
use crate::types::{Credentials, Direction, Event, Metadata, Receipt, RoomAccountData};

use super::commit::{CommitBatch, CommitSummary};
use super::config::StoreConfig;
use super::disk::DiskStore;
use super::open::{open_session, LoadedSession, OpenReport};

/// Everything a store needs besides what the open job loads.
struct StoreParts {
    disk: Arc<DiskStore>,
    worker: Worker,
    guard: Arc<CrashGuard>,
    preload: SharedPreload,
}

/// A store whose open job is still running on the background worker.
pub struct PendingOpen {
    parts: Option<StoreParts>,
    completion: Completion<LoadedSession>,
}

impl PendingOpen {
    /// Block until the store is ready.
    pub fn wait(mut self) -> StoreResult<FileStore> {
        let session = self.completion.wait()?;
        match self.parts.take() {
            Some(parts) => Ok(FileStore::install(parts, session)),
            None => Err(crate::types::StoreError::WorkerClosed),
        }
    }

    /// The store if the open job has finished, without blocking.
    ///
    /// Once a store has been returned, later polls return None.
    pub fn poll(&mut self) -> StoreResult<Option<FileStore>> {
        if self.parts.is_none() {
            return Ok(None);
        }
        match self.completion.try_take()? {
            Some(session) => Ok(self.parts.take().map(|p| FileStore::install(p, session))),
            None => Ok(None),
        }
    }
}

/// Persistent store for one user's rooms, receipts and session metadata.
///
/// Mutations apply to memory immediately and mark the room dirty; nothing
/// reaches the disk until [`commit`](Self::commit), except explicit deletions.
pub struct FileStore {
    disk: Arc<DiskStore>,
    worker: Worker,
    guard: Arc<CrashGuard>,
    preload: SharedPreload,
    memory: MemoryStore,
    dirty: DirtyTracker,
    metadata: Option<Metadata>,
    metadata_changed: bool,
    report: OpenReport,
}

impl FileStore {
    /// Start opening the store of `credentials.user_id` under the configured root.
    ///
    /// Only failing to start the background worker is an error; anything
    /// wrong with the data on disk leads to a wiped, fresh store.
    pub fn open(config: StoreConfig, credentials: Credentials) -> StoreResult<PendingOpen> {
        let paths = StorePaths::new(config.root(), &credentials.user_id);
        let guard = Arc::new(CrashGuard::new(paths.saving_marker()));
        let disk = Arc::new(DiskStore::new(
            paths,
            config.record_codec(),
            config.writes_are_synced(),
        ));
        let worker = Worker::spawn(config.thread_name())?;
        let preload: SharedPreload = Arc::new(std::sync::Mutex::new(PreloadCache::new()));

        let completion = {
            let disk = disk.clone();
            let preload = preload.clone();
            worker.call(move || open_session(&disk, &credentials, &preload))
        };

        Ok(PendingOpen {
            parts: Some(StoreParts {
                disk,
                worker,
                guard,
                preload,
            }),
            completion,
        })
    }

    fn install(parts: StoreParts, session: LoadedSession) -> Self {
        let mut memory = MemoryStore::new();
        for room in session.rooms {
            memory.insert_room(room);
        }
        for (room_id, receipts) in session.receipts {
            memory.insert_receipts(&room_id, receipts);
        }
        let token = session
            .metadata
            .as_ref()
            .and_then(|m| m.event_stream_token.clone());
        memory.set_event_stream_token(token);

        Self {
            disk: parts.disk,
            worker: parts.worker,
            guard: parts.guard,
            preload: parts.preload,
            memory,
            dirty: DirtyTracker::new(),
            metadata: session.metadata,
            metadata_changed: session.metadata_changed,
            report: session.report,
        }
    }

    /// What the open did.
    pub fn open_report(&self) -> &OpenReport {
        &self.report
    }

    pub fn paths(&self) -> &StorePaths {
        self.disk.paths()
    }

    /// Data survives restarts.
    pub fn is_permanent(&self) -> bool {
        true
    }

    /// Whether anything changed since the last commit.
    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || self.metadata_changed
    }

    // ==================== Commit & lifecycle ====================

    /// Flush everything dirty since the last commit.
    ///
    /// The returned completion can be ignored; it reports what was written.
    /// A store without metadata (incomplete credentials) never writes.
    pub fn commit(&mut self) -> Completion<CommitSummary> {
        let Some(metadata) = &self.metadata else {
            self.dirty.clear();
            log::debug!("no session metadata, commit skipped");
            return Completion::ready(CommitSummary::default());
        };
        let metadata = self.metadata_changed.then(|| metadata.clone());
        self.metadata_changed = false;

        self.guard.begin();
        let snapshot = self.dirty.take();
        let batch = CommitBatch::build(snapshot, &mut self.memory, metadata);

        let disk = self.disk.clone();
        let guard = self.guard.clone();
        self.worker.call(move || batch.run(&disk, &guard))
    }

    /// Wait for all queued disk work, then stop the worker.
    pub fn close(mut self) {
        if let Err(e) = self.worker.drain() {
            log::error!("closing store: {}", e);
        }
        self.worker.shutdown();
        log::info!("closed store {}", self.disk.paths().store_dir().display());
    }

    /// Bytes used on disk by this store.
    pub fn disk_usage(&self) -> Completion<u64> {
        let disk = self.disk.clone();
        self.worker.call(move || disk.disk_usage())
    }

    // ==================== Messages ====================

    /// Ids of every known room.
    pub fn rooms(&self) -> Vec<String> {
        self.memory.room_ids()
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomMessages> {
        self.memory.room(room_id)
    }

    fn room_for_update(&mut self, room_id: &str) -> &mut RoomMessages {
        self.dirty.mark_messages(room_id);
        self.memory.get_or_create_room(room_id).0
    }

    pub fn store_event(&mut self, room_id: &str, event: Event, direction: Direction) {
        self.room_for_update(room_id).store_event(event, direction);
    }

    /// Replace a stored event. Returns false if it is unknown.
    pub fn replace_event(&mut self, room_id: &str, event: Event) -> bool {
        let replaced = self.memory.replace_event(room_id, event);
        if replaced {
            self.dirty.mark_messages(room_id);
        }
        replaced
    }

    pub fn event_with_id(&self, room_id: &str, event_id: &str) -> Option<&Event> {
        self.memory.event_with_id(room_id, event_id)
    }

    pub fn last_message(&self, room_id: &str, types: &[&str]) -> Option<&Event> {
        self.memory.room(room_id)?.last_message(types)
    }

    pub fn unread_events(&self, room_id: &str, user_id: &str, types: &[&str]) -> Vec<&Event> {
        self.memory.unread_events(room_id, user_id, types)
    }

    pub fn set_pagination_token(&mut self, room_id: &str, token: Option<String>) {
        self.room_for_update(room_id).pagination_token = token;
    }

    pub fn set_notification_count(&mut self, room_id: &str, count: u32) {
        self.room_for_update(room_id).notification_count = count;
    }

    pub fn set_highlight_count(&mut self, room_id: &str, count: u32) {
        self.room_for_update(room_id).highlight_count = count;
    }

    pub fn set_has_reached_pagination_end(&mut self, room_id: &str, reached: bool) {
        self.room_for_update(room_id).has_reached_pagination_end = reached;
    }

    pub fn set_partial_text_message(&mut self, room_id: &str, text: Option<String>) {
        self.room_for_update(room_id).partial_text_message = text;
    }

    pub fn store_outgoing_message(&mut self, room_id: &str, event: Event) {
        self.room_for_update(room_id).store_outgoing_message(event);
    }

    pub fn remove_outgoing_message(&mut self, room_id: &str, event_id: &str) -> bool {
        let removed = self
            .memory
            .room_mut(room_id)
            .is_some_and(|room| room.remove_outgoing_message(event_id));
        if removed {
            self.dirty.mark_messages(room_id);
        }
        removed
    }

    pub fn remove_all_outgoing_messages(&mut self, room_id: &str) {
        if let Some(room) = self.memory.room_mut(room_id) {
            room.remove_all_outgoing_messages();
            self.dirty.mark_messages(room_id);
        }
    }

    /// Clear a room's timeline, in memory and on disk, before returning.
    pub fn delete_all_messages(&mut self, room_id: &str) {
        if !self.memory.has_room(room_id) {
            return;
        }
        self.memory.delete_all_messages(room_id);
        self.dirty.mark_messages(room_id);
        if self.metadata.is_none() {
            return;
        }

        // Persist the emptied room (and its receipts) right away.
        let mut single = DirtyTracker::new();
        single.mark_messages(room_id);
        let batch = CommitBatch::build(single.take(), &mut self.memory, None);
        self.guard.begin();
        let disk = self.disk.clone();
        let guard = self.guard.clone();
        if let Err(e) = self.worker.run_blocking(move || batch.run(&disk, &guard)) {
            log::error!("clearing messages of {}: {}", room_id, e);
        }
    }

    /// Forget a room, in memory and on disk, before returning.
    pub fn delete_room(&mut self, room_id: &str) {
        self.memory.delete_room(room_id);
        self.dirty.forget_room(room_id);
        lock_preload(&self.preload).evict_room(room_id);

        let disk = self.disk.clone();
        let id = room_id.to_string();
        match self.worker.run_blocking(move || disk.delete_room_data(&id)) {
            Ok(Ok(())) => log::debug!("deleted room {}", room_id),
            Ok(Err(e)) => log::error!("deleting files of room {}: {}", room_id, e),
            Err(e) => log::error!("deleting room {}: {}", room_id, e),
        }
    }

    /// Forget everything, in memory and on disk, before returning.
    ///
    /// The store has no metadata afterwards, so later commits write nothing
    /// until it is reopened.
    pub fn delete_all_data(&mut self) {
        self.memory.delete_all_data();
        self.dirty.clear();
        lock_preload(&self.preload).clear();
        self.metadata = None;
        self.metadata_changed = false;

        let disk = self.disk.clone();
        match self.worker.run_blocking(move || disk.wipe()) {
            Ok(Ok(())) => log::info!("deleted all data"),
            Ok(Err(e)) => log::error!("deleting all data: {}", e),
            Err(e) => log::error!("deleting all data: {}", e),
        }
    }

    // ==================== State & account data ====================

    /// Replace a room's state.
    pub fn store_state(&mut self, room_id: &str, state: Vec<Event>) {
        self.ensure_room(room_id);
        lock_preload(&self.preload).evict_state(room_id);
        self.dirty.mark_state(room_id, state);
    }

    /// A room's state: uncommitted value, else preloaded, else read from disk.
    pub fn state_of_room(&self, room_id: &str) -> Completion<Option<Vec<Event>>> {
        if let Some(state) = self.dirty.pending_state(room_id) {
            return Completion::ready(Some(state.clone()));
        }
        if !self.memory.has_room(room_id) {
            return Completion::ready(None);
        }
        let disk = self.disk.clone();
        let preload = self.preload.clone();
        let id = room_id.to_string();
        self.worker.call(move || disk.state_on_demand(&id, &preload))
    }

    /// Replace a room's account data.
    pub fn store_account_data(&mut self, room_id: &str, account_data: RoomAccountData) {
        self.ensure_room(room_id);
        lock_preload(&self.preload).evict_account_data(room_id);
        self.dirty.mark_account_data(room_id, account_data);
    }

    /// A room's account data: uncommitted value, else preloaded, else read from disk.
    pub fn account_data_of_room(&self, room_id: &str) -> Completion<Option<RoomAccountData>> {
        if let Some(data) = self.dirty.pending_account_data(room_id) {
            return Completion::ready(Some(data.clone()));
        }
        if !self.memory.has_room(room_id) {
            return Completion::ready(None);
        }
        let disk = self.disk.clone();
        let preload = self.preload.clone();
        let id = room_id.to_string();
        self.worker.call(move || disk.account_data_on_demand(&id, &preload))
    }

    // ==================== Receipts ====================

    /// Store a user's receipt if it is newer than the current one.
    pub fn store_receipt(&mut self, room_id: &str, user_id: &str, receipt: Receipt) -> bool {
        self.ensure_room(room_id);
        let stored = self.memory.store_receipt(room_id, user_id, receipt);
        if stored {
            self.dirty.mark_receipts(room_id);
        }
        stored
    }

    pub fn receipt(&self, room_id: &str, user_id: &str) -> Option<Receipt> {
        self.memory.receipt(room_id, user_id)
    }

    pub fn receipts_for_event(&self, room_id: &str, event_id: &str) -> Vec<(String, Receipt)> {
        self.memory.receipts_for_event(room_id, event_id)
    }

    /// Rooms only exist on disk with a messages record; create one if needed.
    fn ensure_room(&mut self, room_id: &str) {
        if self.memory.get_or_create_room(room_id).1 {
            self.dirty.mark_messages(room_id);
        }
    }

    // ==================== Session metadata ====================

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn update_metadata(&mut self, update: impl FnOnce(&mut Metadata)) {
        if let Some(metadata) = self.metadata.as_mut() {
            update(metadata);
            self.metadata_changed = true;
        }
    }

    pub fn event_stream_token(&self) -> Option<&str> {
        self.memory.event_stream_token()
    }

    /// Set the sync checkpoint. Live immediately, persisted last by the next commit.
    pub fn set_event_stream_token(&mut self, token: Option<String>) {
        self.memory.set_event_stream_token(token.clone());
        self.update_metadata(|m| m.event_stream_token = token);
    }

    pub fn user_display_name(&self) -> Option<&str> {
        self.metadata.as_ref()?.user_display_name.as_deref()
    }

    pub fn set_user_display_name(&mut self, name: Option<String>) {
        self.update_metadata(|m| m.user_display_name = name);
    }

    pub fn user_avatar_url(&self) -> Option<&str> {
        self.metadata.as_ref()?.user_avatar_url.as_deref()
    }

    pub fn set_user_avatar_url(&mut self, url: Option<String>) {
        self.update_metadata(|m| m.user_avatar_url = url);
    }

    pub fn user_account_data(&self, event_type: &str) -> Option<&serde_json::Value> {
        self.metadata.as_ref()?.user_account_data.get(event_type)
    }

    pub fn set_user_account_data(&mut self, event_type: &str, content: serde_json::Value) {
        let key = event_type.to_string();
        self.update_metadata(|m| {
            m.user_account_data.insert(key, content);
        });
    }
}
