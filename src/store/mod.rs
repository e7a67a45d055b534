//! The persistent file store: session opener, commit pipeline and the public facade.

pub mod commit;
pub mod config;
pub mod disk;
pub mod file_store;
pub mod open;

pub use commit::{CommitSummary, WrittenRecord};
pub use config::StoreConfig;
pub use file_store::{FileStore, PendingOpen};
pub use open::{OpenReport, WipeReason};
