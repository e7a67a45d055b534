//! Store configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::format::{BinaryCodec, RecordCodec};

/// Default name of the background I/O thread.
pub const DEFAULT_WORKER_NAME: &str = "roomcache-io";

/// How to open a [`FileStore`](super::FileStore).
#[derive(Clone)]
pub struct StoreConfig {
    root: PathBuf,
    codec: Arc<dyn RecordCodec>,
    sync_writes: bool,
    worker_name: String,
}

impl StoreConfig {
    /// Config for stores under `root`, one directory per user.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            codec: Arc::new(BinaryCodec),
            sync_writes: true,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }

    /// Use a different record codec.
    pub fn codec(mut self, codec: Arc<dyn RecordCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Whether each record is fsynced before it replaces the previous one.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Name of the background I/O thread.
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_codec(&self) -> Arc<dyn RecordCodec> {
        self.codec.clone()
    }

    pub fn writes_are_synced(&self) -> bool {
        self.sync_writes
    }

    pub fn thread_name(&self) -> &str {
        &self.worker_name
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("root", &self.root)
            .field("sync_writes", &self.sync_writes)
            .field("worker_name", &self.worker_name)
            .finish()
    }
}
