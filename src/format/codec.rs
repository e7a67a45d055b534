//! Record codec: turns one logical record into bytes and back.

use std::io::Cursor;

use serde::de::DeserializeOwned;

use crate::memory::RoomMessages;
use crate::types::error::{StoreError, StoreResult};
use crate::types::header::{RecordHeader, HEADER_SIZE};
use crate::types::{Event, Metadata, ReceiptMap, RecordKind, RoomAccountData};

use super::compression::{compress_payload, decompress_payload};

/// One logical record, as persisted in one file.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Metadata(Metadata),
    Messages(RoomMessages),
    State(Vec<Event>),
    AccountData(RoomAccountData),
    Receipts(ReceiptMap),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Metadata(_) => RecordKind::Metadata,
            Self::Messages(_) => RecordKind::Messages,
            Self::State(_) => RecordKind::State,
            Self::AccountData(_) => RecordKind::AccountData,
            Self::Receipts(_) => RecordKind::Receipts,
        }
    }
}

/// Encodes and decodes records. Injected into the store; decode failures
/// must come back as errors, never as panics.
pub trait RecordCodec: Send + Sync {
    fn encode(&self, record: &Record) -> StoreResult<Vec<u8>>;

    fn decode(&self, kind: RecordKind, bytes: &[u8]) -> StoreResult<Record>;
}

/// Default codec: 8-byte header, then an LZ4-compressed JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RecordCodec for BinaryCodec {
    fn encode(&self, record: &Record) -> StoreResult<Vec<u8>> {
        let payload = match record {
            Record::Metadata(m) => serde_json::to_vec(m)?,
            Record::Messages(m) => serde_json::to_vec(m)?,
            Record::State(s) => serde_json::to_vec(s)?,
            Record::AccountData(a) => serde_json::to_vec(a)?,
            Record::Receipts(r) => serde_json::to_vec(r)?,
        };
        let compressed = compress_payload(&payload);

        let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
        RecordHeader::new(record.kind()).write_to(&mut out)?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(&self, kind: RecordKind, bytes: &[u8]) -> StoreResult<Record> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::Truncated);
        }
        let header = RecordHeader::read_from(&mut Cursor::new(&bytes[..HEADER_SIZE]))?;
        if header.kind != kind {
            return Err(StoreError::KindMismatch {
                expected: kind,
                found: header.kind,
            });
        }

        let payload = decompress_payload(&bytes[HEADER_SIZE..])?;
        Ok(match kind {
            RecordKind::Metadata => Record::Metadata(parse(&payload)?),
            RecordKind::Messages => Record::Messages(parse(&payload)?),
            RecordKind::State => Record::State(parse(&payload)?),
            RecordKind::AccountData => Record::AccountData(parse(&payload)?),
            RecordKind::Receipts => Record::Receipts(parse(&payload)?),
        })
    }
}

fn parse<T: DeserializeOwned>(payload: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(payload)?)
}
