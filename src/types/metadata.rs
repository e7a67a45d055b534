//! Session credentials and the per-store metadata record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{now_millis, STORE_VERSION};

/// Identity of the session a store belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub homeserver: String,
    pub user_id: String,
    /// Missing until the user has logged in.
    pub access_token: Option<String>,
}

impl Credentials {
    pub fn new(
        homeserver: impl Into<String>,
        user_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            homeserver: homeserver.into(),
            user_id: user_id.into(),
            access_token: Some(access_token.into()),
        }
    }

    /// Credentials with no access token.
    pub fn anonymous(homeserver: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            homeserver: homeserver.into(),
            user_id: user_id.into(),
            access_token: None,
        }
    }

    /// All of homeserver, user id and access token are present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.homeserver.is_empty()
            && !self.user_id.is_empty()
            && self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Global session metadata. Exactly one per store, written last on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// On-disk layout version; any mismatch retires the whole store.
    pub version: u32,
    pub homeserver: String,
    pub user_id: String,
    pub access_token: Option<String>,
    /// Sync checkpoint: where the next sync resumes.
    pub event_stream_token: Option<String>,
    pub user_display_name: Option<String>,
    pub user_avatar_url: Option<String>,
    /// Global account data, keyed by event type.
    #[serde(default)]
    pub user_account_data: BTreeMap<String, serde_json::Value>,
    /// When this store was created (Unix epoch milliseconds).
    #[serde(default)]
    pub created_at: u64,
}

impl Metadata {
    /// Fresh metadata for the given credentials, stamped with the current store version.
    pub fn fresh(credentials: &Credentials) -> Self {
        Self {
            version: STORE_VERSION,
            homeserver: credentials.homeserver.clone(),
            user_id: credentials.user_id.clone(),
            access_token: credentials.access_token.clone(),
            event_stream_token: None,
            user_display_name: None,
            user_avatar_url: None,
            user_account_data: BTreeMap::new(),
            created_at: now_millis(),
        }
    }

    /// Whether this metadata was written for exactly these credentials.
    pub fn matches(&self, credentials: &Credentials) -> bool {
        self.homeserver == credentials.homeserver
            && self.user_id == credentials.user_id
            && self.access_token == credentials.access_token
    }
}
