//! Session opener: validate what is on disk, load it, or start clean.

use crate::engine::marker::CrashGuard;
use crate::engine::preload::{lock_preload, SharedPreload};
use crate::format::ReadOutcome;
use crate::memory::RoomMessages;
use crate::types::{Credentials, Metadata, ReceiptMap, RecordKind, STORE_VERSION};

use super::disk::DiskStore;

/// Why an open discarded everything on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WipeReason {
    /// No readable metadata record (new store, or metadata corrupt).
    NoMetadata,
    /// The store was written by an incompatible layout version.
    VersionMismatch { found: u32, expected: u32 },
    /// The caller has no complete credentials to validate against.
    IncompleteCredentials,
    /// Homeserver, user id or access token differ from the stored ones.
    CredentialsMismatch,
    /// The crash marker was found: a commit never finished.
    InterruptedCommit,
    /// A room record could not be decoded.
    CorruptRecord { room_id: String, kind: RecordKind },
    /// Room directories, loaded rooms and loaded receipts disagree.
    RoomCountMismatch {
        room_dirs: usize,
        rooms_loaded: usize,
        receipts_loaded: usize,
    },
    /// The rooms directory could not be listed.
    UnreadableRooms(String),
}

impl std::fmt::Display for WipeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMetadata => write!(f, "no metadata"),
            Self::VersionMismatch { found, expected } => {
                write!(f, "store version {} (expected {})", found, expected)
            }
            Self::IncompleteCredentials => write!(f, "incomplete credentials"),
            Self::CredentialsMismatch => write!(f, "credentials changed"),
            Self::InterruptedCommit => write!(f, "interrupted commit"),
            Self::CorruptRecord { room_id, kind } => {
                write!(f, "corrupt {} record in {}", kind, room_id)
            }
            Self::RoomCountMismatch {
                room_dirs,
                rooms_loaded,
                receipts_loaded,
            } => write!(
                f,
                "{} room directories, {} rooms and {} receipt maps loaded",
                room_dirs, rooms_loaded, receipts_loaded
            ),
            Self::UnreadableRooms(msg) => write!(f, "unreadable rooms directory: {}", msg),
        }
    }
}

/// What opening the store did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenReport {
    /// Set if the store was wiped.
    pub wipe: Option<WipeReason>,
    pub rooms_loaded: usize,
    pub states_preloaded: usize,
    pub account_data_preloaded: usize,
    /// Fresh metadata was created for the supplied credentials.
    pub metadata_created: bool,
}

impl OpenReport {
    /// Whether previous session data was resumed.
    pub fn resumed(&self) -> bool {
        self.wipe.is_none()
    }
}

/// Result of the open job, handed from the worker to the store.
#[derive(Debug, Default)]
pub struct LoadedSession {
    pub metadata: Option<Metadata>,
    pub metadata_changed: bool,
    pub rooms: Vec<RoomMessages>,
    pub receipts: Vec<(String, ReceiptMap)>,
    pub report: OpenReport,
}

/// Check stored metadata against the caller's credentials.
pub fn validate_metadata(
    metadata: Option<Metadata>,
    credentials: &Credentials,
) -> Result<Metadata, WipeReason> {
    let metadata = metadata.ok_or(WipeReason::NoMetadata)?;
    if metadata.version != STORE_VERSION {
        return Err(WipeReason::VersionMismatch {
            found: metadata.version,
            expected: STORE_VERSION,
        });
    }
    if !credentials.is_complete() {
        return Err(WipeReason::IncompleteCredentials);
    }
    if !metadata.matches(credentials) {
        return Err(WipeReason::CredentialsMismatch);
    }
    Ok(metadata)
}

/// The open job. Never fails: every inconsistency ends in a wiped, empty store.
pub fn open_session(
    disk: &DiskStore,
    credentials: &Credentials,
    preload: &SharedPreload,
) -> LoadedSession {
    let stored = match disk.load_metadata() {
        ReadOutcome::Loaded(metadata) => Some(metadata),
        ReadOutcome::NotFound => None,
        ReadOutcome::Corrupt(e) => {
            log::warn!("metadata is unreadable, treating it as absent: {}", e);
            None
        }
    };

    let outcome = validate_metadata(stored, credentials).and_then(|metadata| {
        if CrashGuard::was_interrupted(&disk.paths().saving_marker()) {
            return Err(WipeReason::InterruptedCommit);
        }
        let loaded = disk.load_rooms(preload)?;
        Ok((metadata, loaded))
    });

    let mut session = LoadedSession::default();
    match outcome {
        Ok((metadata, loaded)) => {
            session.report.rooms_loaded = loaded.rooms.len();
            session.report.states_preloaded = loaded.states_preloaded;
            session.report.account_data_preloaded = loaded.account_data_preloaded;
            session.rooms = loaded.rooms;
            session.receipts = loaded.receipts.into_iter().collect();
            session.metadata = Some(metadata);
            log::info!(
                "resumed store {} with {} rooms",
                disk.paths().store_dir().display(),
                session.report.rooms_loaded
            );
        }
        Err(reason) => {
            if reason == WipeReason::NoMetadata {
                log::info!("starting a new store at {}", disk.paths().store_dir().display());
            } else {
                log::warn!("wiping store {}: {}", disk.paths().store_dir().display(), reason);
            }
            lock_preload(preload).clear();
            if let Err(e) = disk.wipe() {
                log::error!("wipe of {} failed: {}", disk.paths().store_dir().display(), e);
            }
            session.report.wipe = Some(reason);
        }
    }

    if session.metadata.is_none() && credentials.is_complete() {
        session.metadata = Some(Metadata::fresh(credentials));
        session.metadata_changed = true;
        session.report.metadata_created = true;
    }
    session
}
