use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Document version this crate reads and writes.
pub const PROGRESS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressDocument {
    pub version: u32,
    pub conversations: BTreeMap<String, ProgressRecord>,
}

impl ProgressDocument {
    /// Creates a current-version document with no conversations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: PROGRESS_VERSION,
            conversations: BTreeMap::new(),
        }
    }
}

impl Default for ProgressDocument {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressRecord {
    pub last_message_id: String,
    pub saved_at: String,
}
