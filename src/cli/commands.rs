//! CLI command implementations.
//!
//! Read-only commands decode records directly and never validate, so looking
//! at a store can not wipe it.

use std::path::Path;
use std::sync::Arc;

use crate::engine::marker::CrashGuard;
use crate::format::{BinaryCodec, ReadOutcome, StorePaths};
use crate::store::disk::DiskStore;
use crate::types::{RecordKind, StoreResult, STORE_VERSION};

fn open_disk(root: &Path, user_id: &str) -> DiskStore {
    DiskStore::new(StorePaths::new(root, user_id), Arc::new(BinaryCodec), false)
}

fn outcome_label<T>(outcome: &ReadOutcome<T>) -> &'static str {
    match outcome {
        ReadOutcome::Loaded(_) => "ok",
        ReadOutcome::NotFound => "missing",
        ReadOutcome::Corrupt(_) => "corrupt",
    }
}

/// Display information about a user's store.
pub fn cmd_info(root: &Path, user_id: &str, json: bool) -> StoreResult<()> {
    let disk = open_disk(root, user_id);
    let metadata = disk.load_metadata();
    let room_count = disk.room_ids_on_disk().map(|ids| ids.len()).unwrap_or(0);
    let interrupted = CrashGuard::was_interrupted(&disk.paths().saving_marker());
    let usage = disk.disk_usage();
    let status = outcome_label(&metadata);
    let metadata = metadata.loaded();

    if json {
        let info = serde_json::json!({
            "store": disk.paths().store_dir().display().to_string(),
            "metadata": status,
            "version": metadata.as_ref().map(|m| m.version),
            "supported_version": STORE_VERSION,
            "homeserver": metadata.as_ref().map(|m| m.homeserver.clone()),
            "user_id": metadata.as_ref().map(|m| m.user_id.clone()),
            "event_stream_token": metadata.as_ref().and_then(|m| m.event_stream_token.clone()),
            "display_name": metadata.as_ref().and_then(|m| m.user_display_name.clone()),
            "created_at": metadata.as_ref().map(|m| m.created_at),
            "rooms": room_count,
            "interrupted_commit": interrupted,
            "disk_usage": usage,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!("Store: {}", disk.paths().store_dir().display());
        println!("Metadata: {}", status);
        if let Some(m) = &metadata {
            println!("Version: {} (supported {})", m.version, STORE_VERSION);
            println!("Homeserver: {}", m.homeserver);
            println!("User: {}", m.user_id);
            println!(
                "Sync token: {}",
                m.event_stream_token.as_deref().unwrap_or("-")
            );
            println!(
                "Display name: {}",
                m.user_display_name.as_deref().unwrap_or("-")
            );
            println!("Created: {}", format_timestamp(m.created_at));
        }
        println!("Rooms: {}", room_count);
        println!(
            "Interrupted commit: {}",
            if interrupted { "yes" } else { "no" }
        );
        println!("Disk usage: {}", format_size(usage));
    }
    Ok(())
}

/// List the rooms of a user's store.
pub fn cmd_rooms(root: &Path, user_id: &str, json: bool) -> StoreResult<()> {
    let disk = open_disk(root, user_id);
    let ids = match disk.room_ids_on_disk() {
        Ok(ids) => ids,
        Err(reason) => {
            eprintln!("Cannot list rooms: {}", reason);
            Vec::new()
        }
    };

    let mut rows = Vec::with_capacity(ids.len());
    for room_id in &ids {
        let messages = disk.load_messages(room_id);
        let receipts = disk.load_receipts(room_id);
        let state = disk.paths().room_record(room_id, RecordKind::State).exists();
        let account_data = disk
            .paths()
            .room_record(room_id, RecordKind::AccountData)
            .exists();
        let messages_status = outcome_label(&messages);
        let receipts_status = outcome_label(&receipts);
        let events = messages.loaded().map(|room| room.len());
        let receipt_count = receipts.loaded().map(|map| map.len());
        rows.push(serde_json::json!({
            "room_id": room_id,
            "messages": messages_status,
            "events": events,
            "receipts": receipts_status,
            "receipt_count": receipt_count,
            "state": state,
            "account_data": account_data,
        }));
        if !json {
            println!(
                "{}  events={} receipts={} state={} account_data={}",
                room_id,
                events.map_or(messages_status.to_string(), |n| n.to_string()),
                receipt_count.map_or(receipts_status.to_string(), |n| n.to_string()),
                if state { "yes" } else { "no" },
                if account_data { "yes" } else { "no" },
            );
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_default()
        );
    } else if ids.is_empty() {
        println!("No rooms.");
    }
    Ok(())
}

/// Show how much disk space a user's store takes.
pub fn cmd_usage(root: &Path, user_id: &str, json: bool) -> StoreResult<()> {
    let disk = open_disk(root, user_id);
    let usage = disk.disk_usage();
    if json {
        let info = serde_json::json!({ "bytes": usage });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!("{} ({} bytes)", format_size(usage), usage);
    }
    Ok(())
}

/// Delete everything stored for a user.
pub fn cmd_wipe(root: &Path, user_id: &str, json: bool) -> StoreResult<()> {
    let disk = open_disk(root, user_id);
    let freed = disk.disk_usage();
    disk.wipe()?;
    log::info!("wiped {}", disk.paths().store_dir().display());
    if json {
        let info = serde_json::json!({ "wiped": true, "freed_bytes": freed });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!(
            "Wiped {} ({} freed)",
            disk.paths().store_dir().display(),
            format_size(freed)
        );
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_timestamp(millis: u64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis as i64) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{} ms", millis),
    }
}
