//! Record file I/O: atomic writes, three-way reads.

use std::io::{self, Write};
use std::path::Path;

use crate::types::error::{StoreError, StoreResult};
use crate::types::RecordKind;

use super::codec::{Record, RecordCodec};

/// Outcome of reading one record file.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    /// The record decoded cleanly.
    Loaded(T),
    /// There is no file for this record.
    NotFound,
    /// The file exists but could not be read or decoded.
    Corrupt(StoreError),
}

impl<T> ReadOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadOutcome<U> {
        match self {
            Self::Loaded(value) => ReadOutcome::Loaded(f(value)),
            Self::NotFound => ReadOutcome::NotFound,
            Self::Corrupt(err) => ReadOutcome::Corrupt(err),
        }
    }

    /// The value if loaded; corruption and absence both become None.
    pub fn loaded(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}

/// Read and decode the record of the given kind at `path`.
pub fn read_record(path: &Path, kind: RecordKind, codec: &dyn RecordCodec) -> ReadOutcome<Record> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ReadOutcome::NotFound,
        Err(e) => return ReadOutcome::Corrupt(StoreError::Io(e)),
    };
    match codec.decode(kind, &bytes) {
        Ok(record) if record.kind() == kind => ReadOutcome::Loaded(record),
        Ok(record) => ReadOutcome::Corrupt(StoreError::KindMismatch {
            expected: kind,
            found: record.kind(),
        }),
        Err(e) => ReadOutcome::Corrupt(e),
    }
}

/// Encode `record` and replace the file at `path` with it atomically.
///
/// Parent directories are created. With `sync` the data reaches the disk
/// before the rename makes it visible.
pub fn write_record(
    path: &Path,
    record: &Record,
    codec: &dyn RecordCodec,
    sync: bool,
) -> StoreResult<()> {
    let bytes = codec.encode(record)?;
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::other("record path has no parent directory"))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    if sync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Remove a file; a missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a directory tree; a missing directory is not an error.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Total size in bytes of all files under `path`.
pub fn dir_size(path: &Path) -> io::Result<u64> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    if !meta.is_dir() {
        return Ok(meta.len());
    }
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        total += dir_size(&entry?.path())?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::codec::BinaryCodec;
    use crate::types::Event;

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        assert!(matches!(
            read_record(&path, RecordKind::State, &BinaryCodec),
            ReadOutcome::NotFound
        ));

        std::fs::write(&path, b"not a record").unwrap();
        assert!(read_record(&path, RecordKind::State, &BinaryCodec).is_corrupt());
    }

    #[test]
    fn test_write_creates_directories_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms").join("!r").join("state");
        let first = Record::State(vec![Event::new("$1", "m.room.name", "@a").with_state_key("")]);
        write_record(&path, &first, &BinaryCodec, true).unwrap();
        write_record(&path, &Record::State(Vec::new()), &BinaryCodec, false).unwrap();

        let back = read_record(&path, RecordKind::State, &BinaryCodec).loaded();
        assert_eq!(back, Some(Record::State(Vec::new())));
        // Only the record itself: no temporary files left behind.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
        assert_eq!(dir_size(dir.path()).unwrap(), std::fs::metadata(&path).unwrap().len());
    }
}
