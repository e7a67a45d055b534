//! On-disk representation: record codec, path layout, record file I/O.

pub mod codec;
pub mod compression;
pub mod file;
pub mod paths;

pub use codec::{BinaryCodec, Record, RecordCodec};
pub use file::{read_record, write_record, ReadOutcome};
pub use paths::StorePaths;
