//! Error types for the roomcache library.

use thiserror::Error;

use super::record::RecordKind;

/// All errors that can occur in the roomcache library.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid magic bytes in a record header.
    #[error("Invalid magic bytes in record header")]
    InvalidMagic,

    /// Unsupported record header version.
    #[error("Unsupported record header version: {0}")]
    UnsupportedVersion(u16),

    /// Unknown record kind tag in a record header.
    #[error("Unknown record kind tag: {0}")]
    UnknownKind(u8),

    /// The record on disk is not of the kind that was asked for.
    #[error("Expected a {expected} record, found {found}")]
    KindMismatch {
        expected: RecordKind,
        found: RecordKind,
    },

    /// Record is empty or truncated.
    #[error("Record is empty or truncated")]
    Truncated,

    /// Compression error.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Payload (de)serialization error.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The background worker is gone; queued work will never complete.
    #[error("Background worker has shut down")]
    WorkerClosed,
}

/// Convenience result type for roomcache operations.
pub type StoreResult<T> = Result<T, StoreError>;
