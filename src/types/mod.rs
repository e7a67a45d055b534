//! All data types for the roomcache library.

pub mod error;
pub mod event;
pub mod header;
pub mod metadata;
pub mod record;

pub use error::{StoreError, StoreResult};
pub use event::{Direction, Event, Receipt, ReceiptMap, RoomAccountData};
pub use header::{RecordHeader, HEADER_SIZE};
pub use metadata::{Credentials, Metadata};
pub use record::RecordKind;

/// Magic bytes at the start of every record file.
pub const RECORD_MAGIC: [u8; 4] = [0x52, 0x43, 0x53, 0x54]; // "RCST"

/// Current record header version.
pub const RECORD_HEADER_VERSION: u16 = 1;

/// Current on-disk store layout version, embedded in [`Metadata`].
///
/// Bumping it retires every existing store: they are wiped on next open.
pub const STORE_VERSION: u32 = 1;

/// Returns the current time as Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
