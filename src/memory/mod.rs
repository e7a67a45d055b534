//! The in-memory room layer whose mutations the file store persists.

pub mod room;
pub mod store;

pub use room::RoomMessages;
pub use store::{lock_receipts, MemoryStore, SharedReceipts};
