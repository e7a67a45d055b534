//! Phase 4 tests: the `rcache` CLI against real stores.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

use roomcache::store::{FileStore, StoreConfig};
use roomcache::types::{Credentials, Direction, Event, Receipt};

// ==================== CLI Helpers ====================

const USER: &str = "@alice:example.org";

/// Locate the `rcache` binary built alongside test binaries.
fn rcache_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove "deps"
    path.push("rcache");
    path
}

/// Run the `rcache` CLI against `root` and return the output.
fn run_rcache(root: &Path, args: &[&str]) -> Output {
    Command::new(rcache_bin())
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to run rcache")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "rcache failed with status {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

/// A store with two rooms and a sync token, committed to disk.
fn seeded_store() -> TempDir {
    let dir = TempDir::new().unwrap();
    let creds = Credentials::new("https://example.org", USER, "T1");
    let mut store = FileStore::open(StoreConfig::new(dir.path()), creds)
        .unwrap()
        .wait()
        .unwrap();
    for (room, id) in [("!a:example.org", "$1"), ("!b:example.org", "$2")] {
        store.store_event(
            room,
            Event::new(id, "m.room.message", "@bob:example.org"),
            Direction::Forwards,
        );
    }
    store.store_receipt("!a:example.org", "@bob:example.org", Receipt::new("$1", 5));
    store.set_event_stream_token(Some("s42".into()));
    store.set_user_display_name(Some("Alice".into()));
    store.commit();
    store.close();
    dir
}

// ==================== CLI Tests ====================

#[test]
fn test_cli_info() {
    let dir = seeded_store();
    let output = run_rcache(dir.path(), &["info", USER]);
    assert_success(&output);
    let text = stdout_str(&output);
    assert!(text.contains("Metadata: ok"), "{}", text);
    assert!(text.contains("Sync token: s42"), "{}", text);
    assert!(text.contains("Display name: Alice"), "{}", text);
    assert!(text.contains("Rooms: 2"), "{}", text);
    assert!(text.contains("Interrupted commit: no"), "{}", text);
}

#[test]
fn test_cli_info_json() {
    let dir = seeded_store();
    let output = run_rcache(dir.path(), &["--format", "json", "info", USER]);
    assert_success(&output);
    let info = stdout_json(&output);
    assert_eq!(info["metadata"], "ok");
    assert_eq!(info["event_stream_token"], "s42");
    assert_eq!(info["rooms"], 2);
    assert_eq!(info["interrupted_commit"], false);
    assert!(info["disk_usage"].as_u64().unwrap() > 0);
}

#[test]
fn test_cli_info_missing_store() {
    let dir = TempDir::new().unwrap();
    let output = run_rcache(dir.path(), &["--format", "json", "info", USER]);
    assert_success(&output);
    let info = stdout_json(&output);
    assert_eq!(info["metadata"], "missing");
    assert_eq!(info["rooms"], 0);
    // Looking must not create anything.
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_cli_rooms() {
    let dir = seeded_store();
    let output = run_rcache(dir.path(), &["rooms", USER]);
    assert_success(&output);
    let text = stdout_str(&output);
    assert!(text.contains("!a:example.org  events=1 receipts=1"), "{}", text);
    assert!(text.contains("!b:example.org  events=1 receipts=0"), "{}", text);

    let output = run_rcache(dir.path(), &["--format", "json", "rooms", USER]);
    assert_success(&output);
    let rows = stdout_json(&output);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["room_id"], "!a:example.org");
    assert_eq!(rows[0]["messages"], "ok");
    assert_eq!(rows[0]["state"], false);
}

#[test]
fn test_cli_usage() {
    let dir = seeded_store();
    let output = run_rcache(dir.path(), &["--format", "json", "usage", USER]);
    assert_success(&output);
    assert!(stdout_json(&output)["bytes"].as_u64().unwrap() > 0);

    let output = run_rcache(dir.path(), &["usage", USER]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("bytes)"));
}

#[test]
fn test_cli_wipe() {
    let dir = seeded_store();
    let output = run_rcache(dir.path(), &["--format", "json", "wipe", USER]);
    assert_success(&output);
    let result = stdout_json(&output);
    assert_eq!(result["wiped"], true);
    assert!(result["freed_bytes"].as_u64().unwrap() > 0);

    let output = run_rcache(dir.path(), &["rooms", USER]);
    assert_success(&output);
    assert!(stdout_str(&output).contains("No rooms."));
}
