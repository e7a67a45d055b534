//! Phase 3 tests: reopening, validation, wipes and the preload cache.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use roomcache::format::file::write_record;
use roomcache::format::{BinaryCodec, Record, RecordCodec};
use roomcache::store::{FileStore, StoreConfig, WipeReason};
use roomcache::types::{
    Credentials, Direction, Event, Metadata, Receipt, RecordKind, RoomAccountData, StoreResult,
    STORE_VERSION,
};

use tempfile::TempDir;

// ==================== Helpers ====================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn creds(token: &str) -> Credentials {
    Credentials::new("https://example.org", "@alice:example.org", token)
}

fn open_as(root: &Path, credentials: Credentials) -> FileStore {
    init_logger();
    FileStore::open(StoreConfig::new(root), credentials)
        .unwrap()
        .wait()
        .unwrap()
}

fn open(root: &Path) -> FileStore {
    open_as(root, creds("T1"))
}

fn message(id: &str, ts: u64) -> Event {
    Event::new(id, "m.room.message", "@bob:example.org")
        .with_content(serde_json::json!({"body": id}))
        .with_timestamp(ts)
}

/// Store with `count` rooms of one message each, committed and closed.
fn seed(root: &Path, count: usize) {
    let mut store = open(root);
    for i in 0..count {
        store.store_event(
            &format!("!r{}:example.org", i),
            message(&format!("$e{}", i), 1000 + i as u64),
            Direction::Forwards,
        );
    }
    store.set_event_stream_token(Some("s1".into()));
    store.commit().wait().unwrap();
    store.close();
}

/// Codec counting decodes per record kind.
#[derive(Default)]
struct CountingCodec {
    state_decodes: AtomicUsize,
    account_data_decodes: AtomicUsize,
}

impl RecordCodec for CountingCodec {
    fn encode(&self, record: &Record) -> StoreResult<Vec<u8>> {
        BinaryCodec.encode(record)
    }

    fn decode(&self, kind: RecordKind, bytes: &[u8]) -> StoreResult<Record> {
        match kind {
            RecordKind::State => self.state_decodes.fetch_add(1, Ordering::SeqCst),
            RecordKind::AccountData => self.account_data_decodes.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
        BinaryCodec.decode(kind, bytes)
    }
}

// ==================== Session Lifecycle ====================

#[test]
fn test_fresh_store() {
    let dir = TempDir::new().unwrap();
    let store = open(dir.path());
    let report = store.open_report();
    assert_eq!(report.wipe, Some(WipeReason::NoMetadata));
    assert!(report.metadata_created);
    assert_eq!(report.rooms_loaded, 0);
    assert_eq!(store.event_stream_token(), None);
    assert_eq!(store.metadata().unwrap().version, STORE_VERSION);
    assert!(store.rooms().is_empty());
    store.close();
}

#[test]
fn test_resume_then_wipe_on_new_token() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    store.set_event_stream_token(Some("s1".into()));
    store.store_event("!r1:example.org", message("$1", 10), Direction::Forwards);
    store.commit();
    store.close();

    let store = open(dir.path());
    assert!(store.open_report().resumed());
    assert_eq!(store.event_stream_token(), Some("s1"));
    assert_eq!(store.rooms(), ["!r1:example.org"]);
    assert!(store.event_with_id("!r1:example.org", "$1").is_some());
    store.close();

    let store = open_as(dir.path(), creds("T2"));
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::CredentialsMismatch)
    );
    assert_eq!(store.event_stream_token(), None);
    assert!(store.rooms().is_empty());
    assert!(!store.paths().room_dir("!r1:example.org").exists());
    store.close();
}

#[test]
fn test_room_contents_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let mut store = open(dir.path());
    let room = "!r1:example.org";
    store.store_event(room, message("$2", 20), Direction::Forwards);
    store.store_event(room, message("$1", 10), Direction::Backwards);
    store.set_pagination_token(room, Some("p9".into()));
    store.set_notification_count(room, 3);
    store.set_highlight_count(room, 1);
    store.set_has_reached_pagination_end(room, true);
    store.set_partial_text_message(room, Some("half a thought".into()));
    store.store_outgoing_message(room, message("$out", 30));
    store.store_receipt(room, "@bob:example.org", Receipt::new("$2", 25));
    store.set_user_display_name(Some("Alice".into()));
    store.set_user_avatar_url(Some("mxc://example.org/a".into()));
    store.set_user_account_data("m.direct", serde_json::json!({"@bob:example.org": [room]}));
    store.commit();
    store.close();

    let store = open(dir.path());
    assert!(store.open_report().resumed());
    let loaded = store.room(room).unwrap();
    let ids: Vec<&str> = loaded.events().iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, ["$1", "$2"]);
    assert_eq!(loaded.pagination_token.as_deref(), Some("p9"));
    assert_eq!(loaded.notification_count, 3);
    assert_eq!(loaded.highlight_count, 1);
    assert!(loaded.has_reached_pagination_end);
    assert_eq!(loaded.partial_text_message.as_deref(), Some("half a thought"));
    assert_eq!(loaded.outgoing_messages().len(), 1);
    assert_eq!(
        store.receipt(room, "@bob:example.org"),
        Some(Receipt::new("$2", 25))
    );
    assert_eq!(store.user_display_name(), Some("Alice"));
    assert_eq!(store.user_avatar_url(), Some("mxc://example.org/a"));
    assert!(store.user_account_data("m.direct").is_some());
    store.close();
}

#[test]
fn test_room_without_receipts_resumes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 2);
    let store = open(dir.path());
    assert!(store.open_report().resumed());
    assert_eq!(store.rooms().len(), 2);
    assert_eq!(store.receipt("!r0:example.org", "@bob:example.org"), None);
    store.close();
}

// ==================== Wipes ====================

#[test]
fn test_crash_marker_wipes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 1);
    let paths = open(dir.path()).paths().clone();
    std::fs::write(paths.saving_marker(), b"").unwrap();

    let store = open(dir.path());
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::InterruptedCommit)
    );
    assert!(store.rooms().is_empty());
    assert!(!paths.saving_marker().exists());
    assert!(!paths.metadata().exists());
    store.close();
}

#[test]
fn test_missing_receipts_record_wipes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 3);
    let store = open(dir.path());
    let receipts = store
        .paths()
        .room_record("!r1:example.org", RecordKind::Receipts);
    store.close();
    std::fs::remove_file(receipts).unwrap();

    let store = open(dir.path());
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::RoomCountMismatch {
            room_dirs: 3,
            rooms_loaded: 3,
            receipts_loaded: 2
        })
    );
    assert!(store.rooms().is_empty());
    store.close();
}

#[test]
fn test_corrupt_messages_wipes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 2);
    let store = open(dir.path());
    let path = store
        .paths()
        .room_record("!r0:example.org", RecordKind::Messages);
    store.close();
    std::fs::write(&path, b"RCST garbage").unwrap();

    let store = open(dir.path());
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::CorruptRecord {
            room_id: "!r0:example.org".into(),
            kind: RecordKind::Messages
        })
    );
    assert!(store.rooms().is_empty());
    store.close();
}

/// Overwrite one record of a seeded room with junk and reopen.
fn reopen_with_corrupt(kind: RecordKind) -> (TempDir, FileStore) {
    let dir = TempDir::new().unwrap();
    let room = "!r0:example.org";
    let mut store = open(dir.path());
    store.store_event(room, message("$1", 10), Direction::Forwards);
    store.store_state(
        room,
        vec![Event::new("$n", "m.room.name", "@bob:example.org").with_state_key("")],
    );
    store.store_account_data(
        room,
        RoomAccountData::new().with("m.tag", serde_json::json!({"tags": {}})),
    );
    store.store_receipt(room, "@bob:example.org", Receipt::new("$1", 11));
    store.commit();
    let path = store.paths().room_record(room, kind);
    store.close();
    std::fs::write(&path, b"RCSTjunkjunk").unwrap();

    let store = open(dir.path());
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::CorruptRecord {
            room_id: room.into(),
            kind
        })
    );
    assert_eq!(store.open_report().rooms_loaded, 0);
    assert!(store.rooms().is_empty());
    assert!(!store.paths().room_dir(room).exists());
    (dir, store)
}

#[test]
fn test_corrupt_state_wipes() {
    let (_dir, store) = reopen_with_corrupt(RecordKind::State);
    assert_eq!(store.state_of_room("!r0:example.org").wait().unwrap(), None);
    store.close();
}

#[test]
fn test_corrupt_account_data_wipes() {
    let (_dir, store) = reopen_with_corrupt(RecordKind::AccountData);
    assert_eq!(
        store.account_data_of_room("!r0:example.org").wait().unwrap(),
        None
    );
    store.close();
}

#[test]
fn test_corrupt_receipts_wipes() {
    let (_dir, store) = reopen_with_corrupt(RecordKind::Receipts);
    assert_eq!(store.receipt("!r0:example.org", "@bob:example.org"), None);
    store.close();
}

#[test]
fn test_corrupt_metadata_starts_fresh() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 1);
    let store = open(dir.path());
    let path = store.paths().metadata();
    store.close();
    std::fs::write(&path, [0xffu8; 40]).unwrap();

    let store = open(dir.path());
    assert_eq!(store.open_report().wipe, Some(WipeReason::NoMetadata));
    assert!(store.open_report().metadata_created);
    assert!(store.rooms().is_empty());
    assert_eq!(store.event_stream_token(), None);
    store.close();
}

#[test]
fn test_version_mismatch_wipes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 1);
    let store = open(dir.path());
    let path = store.paths().metadata();
    store.close();

    let mut old = Metadata::fresh(&creds("T1"));
    old.version = 99;
    write_record(&path, &Record::Metadata(old), &BinaryCodec, false).unwrap();

    let store = open(dir.path());
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::VersionMismatch {
            found: 99,
            expected: STORE_VERSION
        })
    );
    assert_eq!(store.metadata().unwrap().version, STORE_VERSION);
    store.close();
}

#[test]
fn test_anonymous_open_wipes() {
    let dir = TempDir::new().unwrap();
    seed(dir.path(), 1);
    let store = open_as(
        dir.path(),
        Credentials::anonymous("https://example.org", "@alice:example.org"),
    );
    assert_eq!(
        store.open_report().wipe,
        Some(WipeReason::IncompleteCredentials)
    );
    assert!(store.metadata().is_none());
    assert!(store.rooms().is_empty());
    store.close();
}

// ==================== Preload ====================

#[test]
fn test_preloaded_state_is_served_once() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let room = "!r1:example.org";
    let state = vec![Event::new("$n", "m.room.name", "@bob:example.org").with_state_key("")];
    let data = RoomAccountData::new().with("m.tag", serde_json::json!({"tags": {}}));

    let mut store = open(dir.path());
    store.store_state(room, state.clone());
    store.store_account_data(room, data.clone());
    store.commit();
    store.close();

    let codec = Arc::new(CountingCodec::default());
    let store = FileStore::open(StoreConfig::new(dir.path()).codec(codec.clone()), creds("T1"))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(store.open_report().states_preloaded, 1);
    assert_eq!(store.open_report().account_data_preloaded, 1);
    assert_eq!(codec.state_decodes.load(Ordering::SeqCst), 1);

    // First read comes from the cache, the second decodes again.
    assert_eq!(store.state_of_room(room).wait().unwrap(), Some(state.clone()));
    assert_eq!(codec.state_decodes.load(Ordering::SeqCst), 1);
    assert_eq!(store.state_of_room(room).wait().unwrap(), Some(state));
    assert_eq!(codec.state_decodes.load(Ordering::SeqCst), 2);

    assert_eq!(
        store.account_data_of_room(room).wait().unwrap(),
        Some(data.clone())
    );
    assert_eq!(store.account_data_of_room(room).wait().unwrap(), Some(data));
    assert_eq!(codec.account_data_decodes.load(Ordering::SeqCst), 2);
    store.close();
}

#[test]
fn test_new_state_replaces_preloaded_copy() {
    let dir = TempDir::new().unwrap();
    let room = "!r1:example.org";
    let old = vec![Event::new("$old", "m.room.topic", "@bob:example.org").with_state_key("")];
    let new = vec![Event::new("$new", "m.room.topic", "@bob:example.org").with_state_key("")];

    let mut store = open(dir.path());
    store.store_state(room, old);
    store.commit();
    store.close();

    let mut store = open(dir.path());
    store.store_state(room, new.clone());
    store.commit();
    assert_eq!(store.state_of_room(room).wait().unwrap(), Some(new));
    store.close();
}

#[test]
fn test_pending_open_poll() {
    init_logger();
    let dir = TempDir::new().unwrap();
    let mut pending = FileStore::open(StoreConfig::new(dir.path()), creds("T1")).unwrap();
    let store = loop {
        if let Some(store) = pending.poll().unwrap() {
            break store;
        }
        std::thread::yield_now();
    };
    assert!(pending.poll().unwrap().is_none());
    assert!(store.is_permanent());
    store.close();
}
