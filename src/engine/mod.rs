//! Commit machinery: dirty tracking, the background worker, the crash guard and the preload cache.

pub mod dirty;
pub mod marker;
pub mod preload;
pub mod worker;

pub use dirty::{DirtySnapshot, DirtyTracker};
pub use marker::CrashGuard;
pub use preload::{lock_preload, PreloadCache, SharedPreload};
pub use worker::{Completion, Worker};
