use std::fs;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::document::{ProgressDocument, ProgressRecord, PROGRESS_VERSION};
use crate::error::ProgressStoreError;

/// Persisted per-conversation progress.
///
/// Saves replace the whole document through a sibling temp file plus rename,
/// so a reader observes either the previous document or the new one, never a
/// torn write. The store assumes a single writing process per file.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    document: ProgressDocument,
}

impl ProgressStore {
    /// Opens the store backed by the document at `path`.
    ///
    /// A missing, unreadable, unparsable, or wrong-version document is
    /// treated as empty history; the condition is logged, never fatal.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = read_document(&path);
        Self { path, document }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the last processed message id recorded for a conversation.
    #[must_use]
    pub fn last_processed(&self, conversation: &str) -> Option<&str> {
        self.document
            .conversations
            .get(conversation)
            .map(|record| record.last_message_id.as_str())
    }

    /// Records `message_id` as the last processed message of a conversation.
    ///
    /// Performs a full read-modify-write: the document is re-read from disk,
    /// the conversation entry is replaced with a fresh RFC3339 `saved_at`,
    /// and the result is swapped into place atomically.
    pub fn record(
        &mut self,
        conversation: &str,
        message_id: &str,
    ) -> Result<(), ProgressStoreError> {
        let mut document = read_document(&self.path);
        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(ProgressStoreError::ClockFormat)?;
        document.conversations.insert(
            conversation.to_string(),
            ProgressRecord {
                last_message_id: message_id.to_string(),
                saved_at,
            },
        );

        write_document(&self.path, &document)?;
        self.document = document;
        Ok(())
    }
}

fn read_document(path: &Path) -> ProgressDocument {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            return ProgressDocument::empty();
        }
        Err(source) => {
            warn!(
                path = %path.display(),
                error = %source,
                "progress document unreadable; starting with empty history"
            );
            return ProgressDocument::empty();
        }
    };

    match serde_json::from_str::<ProgressDocument>(&raw) {
        Ok(document) if document.version == PROGRESS_VERSION => document,
        Ok(document) => {
            warn!(
                path = %path.display(),
                found = document.version,
                "unsupported progress document version; starting with empty history"
            );
            ProgressDocument::empty()
        }
        Err(source) => {
            warn!(
                path = %path.display(),
                error = %source,
                "progress document unparsable; starting with empty history"
            );
            ProgressDocument::empty()
        }
    }
}

fn write_document(path: &Path, document: &ProgressDocument) -> Result<(), ProgressStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| {
                ProgressStoreError::io("creating progress directory", parent, source)
            })?;
        }
    }

    let serialized = serde_json::to_string_pretty(document)
        .map_err(|source| ProgressStoreError::json_serialize(path, source))?;
    let temp_path = temp_sibling(path);
    fs::write(&temp_path, serialized).map_err(|source| {
        ProgressStoreError::io("writing temp progress document", &temp_path, source)
    })?;
    fs::rename(&temp_path, path).map_err(|source| {
        ProgressStoreError::io("renaming temp progress document", &temp_path, source)
    })?;

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_else(|| crate::paths::PROGRESS_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}
