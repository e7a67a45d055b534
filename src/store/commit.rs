//! Commit pipeline: turn a dirty snapshot into ordered record writes.

use std::collections::BTreeSet;

use crate::engine::dirty::DirtySnapshot;
use crate::engine::marker::CrashGuard;
use crate::format::Record;
use crate::memory::{lock_receipts, MemoryStore, RoomMessages, SharedReceipts};
use crate::types::{Event, Metadata, RecordKind, RoomAccountData};

use super::disk::DiskStore;

/// One record written by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    pub kind: RecordKind,
    /// None for the metadata record.
    pub room_id: Option<String>,
}

/// What a commit wrote, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub written: Vec<WrittenRecord>,
    /// Records that failed to write.
    pub failures: usize,
    pub metadata_written: bool,
}

impl CommitSummary {
    /// Number of records of one kind written.
    pub fn count(&self, kind: RecordKind) -> usize {
        self.written.iter().filter(|w| w.kind == kind).count()
    }
}

/// Everything one commit will write, captured on the committing thread.
///
/// Apart from receipt maps, which stay shared and are locked while written,
/// the batch owns immutable copies.
#[derive(Default)]
pub struct CommitBatch {
    messages: Vec<RoomMessages>,
    state: Vec<(String, Vec<Event>)>,
    account_data: Vec<(String, RoomAccountData)>,
    receipts: Vec<(String, SharedReceipts)>,
    metadata: Option<Metadata>,
}

impl CommitBatch {
    /// Capture the rooms named in `snapshot` that still exist in `memory`.
    ///
    /// Receipts follow messages: every room whose messages are written gets its
    /// receipt map written too, even when it is empty.
    pub fn build(
        snapshot: DirtySnapshot,
        memory: &mut MemoryStore,
        metadata: Option<Metadata>,
    ) -> Self {
        let mut batch = Self {
            metadata,
            ..Self::default()
        };

        for room_id in &snapshot.messages {
            match memory.room(room_id) {
                Some(room) => batch.messages.push(room.clone()),
                None => log::debug!("skipping messages of deleted room {}", room_id),
            }
        }
        batch.state = snapshot
            .state
            .into_iter()
            .filter(|(room_id, _)| memory.has_room(room_id))
            .collect();
        batch.account_data = snapshot
            .account_data
            .into_iter()
            .filter(|(room_id, _)| memory.has_room(room_id))
            .collect();

        let receipt_rooms: BTreeSet<&String> =
            snapshot.receipts.iter().chain(&snapshot.messages).collect();
        for room_id in receipt_rooms {
            if memory.has_room(room_id) {
                let shared = memory.shared_receipts_or_default(room_id);
                batch.receipts.push((room_id.clone(), shared));
            }
        }
        batch
    }

    /// Write the batch: messages, state, account data, receipts, then metadata.
    ///
    /// Metadata is skipped if any room record failed, so the persisted sync
    /// checkpoint never gets ahead of the room data. Ends the commit on `guard`.
    pub fn run(self, disk: &DiskStore, guard: &CrashGuard) -> CommitSummary {
        let mut summary = CommitSummary::default();

        for room in self.messages {
            let room_id = room.room_id.clone();
            write_room(disk, &mut summary, &room_id, Record::Messages(room));
        }
        for (room_id, state) in self.state {
            write_room(disk, &mut summary, &room_id, Record::State(state));
        }
        for (room_id, data) in self.account_data {
            write_room(disk, &mut summary, &room_id, Record::AccountData(data));
        }
        for (room_id, shared) in self.receipts {
            let map = lock_receipts(&shared);
            write_room(disk, &mut summary, &room_id, Record::Receipts(map.clone()));
        }

        if let Some(metadata) = self.metadata {
            if summary.failures > 0 {
                log::error!(
                    "{} record writes failed, keeping the previous metadata",
                    summary.failures
                );
            } else {
                match disk.write_metadata(metadata) {
                    Ok(()) => {
                        summary.metadata_written = true;
                        summary.written.push(WrittenRecord {
                            kind: RecordKind::Metadata,
                            room_id: None,
                        });
                    }
                    Err(e) => {
                        log::error!("writing metadata failed: {}", e);
                        summary.failures += 1;
                    }
                }
            }
        }

        guard.end();
        log::debug!(
            "commit wrote {} records ({} failures)",
            summary.written.len(),
            summary.failures
        );
        summary
    }
}

fn write_room(disk: &DiskStore, summary: &mut CommitSummary, room_id: &str, record: Record) {
    let kind = record.kind();
    match disk.write_room_record(room_id, &record) {
        Ok(()) => summary.written.push(WrittenRecord {
            kind,
            room_id: Some(room_id.to_string()),
        }),
        Err(e) => {
            log::error!("writing {} of {} failed: {}", kind, room_id, e);
            summary.failures += 1;
        }
    }
}
