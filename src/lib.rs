//! roomcache: crash-safe on-disk cache for a chat client's local data.
//!
//! Persists per-room message history, room state, room account data and read
//! receipts, plus session metadata (credentials, sync checkpoint, profile).
//! Writes are batched by explicit commits and run on a single background
//! worker; the sync checkpoint is always written last, and an interrupted
//! commit or any corruption found at open wipes the store.

pub mod cli;
pub mod engine;
pub mod format;
pub mod memory;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use engine::Completion;
pub use format::{BinaryCodec, Record, RecordCodec, StorePaths};
pub use memory::{MemoryStore, RoomMessages};
pub use store::{
    CommitSummary, FileStore, OpenReport, PendingOpen, StoreConfig, WipeReason, WrittenRecord,
};
pub use types::{
    now_millis, Credentials, Direction, Event, Metadata, Receipt, ReceiptMap, RecordKind,
    RoomAccountData, StoreError, StoreResult, STORE_VERSION,
};
