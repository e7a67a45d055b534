//! Header prepended to every record file.

use std::io::{Read, Write};

use crate::types::error::{StoreError, StoreResult};
use crate::types::record::RecordKind;
use crate::types::{RECORD_HEADER_VERSION, RECORD_MAGIC};

/// Header of a record file. Fixed size: 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    /// Magic bytes: [0x52, 0x43, 0x53, 0x54] ("RCST").
    pub magic: [u8; 4],
    /// Header version (currently 1).
    pub version: u16,
    /// Which record follows.
    pub kind: RecordKind,
}

/// The fixed size of a RecordHeader on disk: 8 bytes.
pub const HEADER_SIZE: usize = 8;

impl RecordHeader {
    /// Create a new header with default magic and version.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            magic: RECORD_MAGIC,
            version: RECORD_HEADER_VERSION,
            kind,
        }
    }

    /// Write this header to the given writer. Writes exactly 8 bytes.
    ///
    /// Layout (all little-endian):
    /// - 0x00..0x04: magic (4 bytes)
    /// - 0x04..0x06: version (u16, 2 bytes)
    /// - 0x06: kind tag (u8)
    /// - 0x07: _reserved (u8, written as 0)
    pub fn write_to(&self, writer: &mut impl Write) -> StoreResult<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[self.kind as u8, 0u8])?;
        Ok(())
    }

    /// Read a header from the given reader. Reads exactly 8 bytes.
    pub fn read_from(reader: &mut impl Read) -> StoreResult<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StoreError::Truncated
            } else {
                StoreError::Io(e)
            }
        })?;

        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != RECORD_MAGIC {
            return Err(StoreError::InvalidMagic);
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != RECORD_HEADER_VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }

        let kind = RecordKind::from_u8(buf[6]).ok_or(StoreError::UnknownKind(buf[6]))?;
        // byte 7 is reserved

        Ok(Self {
            magic,
            version,
            kind,
        })
    }
}
