//! Crash guard: a zero-length marker file present while any commit is in flight.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::file::remove_file_if_exists;

/// Tracks in-flight commits and keeps the marker file in step with them.
///
/// The marker is created when the first commit starts and removed when the
/// last queued one finishes, so back-to-back commits never leave a window
/// without it.
#[derive(Debug)]
pub struct CrashGuard {
    path: PathBuf,
    in_flight: Mutex<usize>,
}

impl CrashGuard {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            in_flight: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a previous session left a commit unfinished.
    pub fn was_interrupted(path: &Path) -> bool {
        path.exists()
    }

    /// Called on the committing thread before any write is queued.
    pub fn begin(&self) {
        let mut count = self.lock();
        *count += 1;
        if let Some(dir) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::error!("cannot create store directory {}: {}", dir.display(), e);
            }
        }
        if let Err(e) = std::fs::File::create(&self.path) {
            log::error!("cannot create crash marker {}: {}", self.path.display(), e);
        }
    }

    /// Called on the worker after a commit's last write.
    pub fn end(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            if let Err(e) = remove_file_if_exists(&self.path) {
                log::error!("cannot remove crash marker {}: {}", self.path.display(), e);
            }
        }
    }

    /// Number of commits started but not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
