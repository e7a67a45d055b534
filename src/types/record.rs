//! Record kinds persisted by the store.

/// The kind of a persisted record. One file per kind per room, plus the
/// store-wide metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RecordKind {
    /// Session metadata (credentials, sync checkpoint, profile).
    Metadata = 0,
    /// A room's message store: timeline, tokens, counters, drafts, outgoing queue.
    Messages = 1,
    /// A room's state events.
    State = 2,
    /// A room's account data.
    AccountData = 3,
    /// A room's read receipts.
    Receipts = 4,
}

impl RecordKind {
    /// Room-scoped kinds in commit order.
    pub const ROOM_KINDS: [RecordKind; 4] = [
        Self::Messages,
        Self::State,
        Self::AccountData,
        Self::Receipts,
    ];

    /// Convert a u8 tag to a RecordKind, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Metadata),
            1 => Some(Self::Messages),
            2 => Some(Self::State),
            3 => Some(Self::AccountData),
            4 => Some(Self::Receipts),
            _ => None,
        }
    }

    /// File name of this record inside its directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Messages => "messages",
            Self::State => "state",
            Self::AccountData => "accountData",
            Self::Receipts => "readReceipts",
        }
    }

    /// Return a human-readable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Messages => "messages",
            Self::State => "state",
            Self::AccountData => "account data",
            Self::Receipts => "receipts",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
