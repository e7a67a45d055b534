//! Where each record of a store lives on disk.
//!
//! ```text
//! <root>/<user-id>/
//!   metadata
//!   savingMarker
//!   rooms/<room-id>/{messages,state,accountData,readReceipts}
//! ```

use std::path::{Path, PathBuf};

use crate::types::RecordKind;

const MARKER_FILE: &str = "savingMarker";
const ROOMS_DIR: &str = "rooms";

/// Path resolver for one user's store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    store_dir: PathBuf,
}

impl StorePaths {
    pub fn new(root: &Path, user_id: &str) -> Self {
        Self {
            store_dir: root.join(encode_component(user_id)),
        }
    }

    /// The user's store directory; a full wipe removes it.
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn metadata(&self) -> PathBuf {
        self.store_dir.join(RecordKind::Metadata.file_name())
    }

    /// Crash marker: present while a commit is in flight.
    pub fn saving_marker(&self) -> PathBuf {
        self.store_dir.join(MARKER_FILE)
    }

    pub fn rooms_dir(&self) -> PathBuf {
        self.store_dir.join(ROOMS_DIR)
    }

    pub fn room_dir(&self, room_id: &str) -> PathBuf {
        self.rooms_dir().join(encode_component(room_id))
    }

    /// File of a room-scoped record.
    pub fn room_record(&self, room_id: &str, kind: RecordKind) -> PathBuf {
        self.room_dir(room_id).join(kind.file_name())
    }
}

/// Escape an id into a single safe path component.
pub fn encode_component(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '\0' => out.push_str("%00"),
            _ => out.push(c),
        }
    }
    match out.as_str() {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => out,
    }
}

/// Inverse of [`encode_component`]. Returns None for names it never produces.
pub fn decode_component(name: &str) -> Option<String> {
    match name {
        "%" => return Some(String::new()),
        "%2E" => return Some(".".to_string()),
        "%2E%2E" => return Some("..".to_string()),
        _ => {}
    }
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3)?;
        out.push(match escape {
            "%25" => '%',
            "%2F" => '/',
            "%5C" => '\\',
            "%00" => '\0',
            _ => return None,
        });
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}
