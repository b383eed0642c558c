//! Persisted watcher progress, one versioned JSON document per watcher.
//!
//! The document maps conversation keys to the id of the last message handled
//! in that conversation, so a restarted watcher resumes instead of replaying
//! history. Exactly one process may own a progress file at a time.

mod document;
mod error;
mod paths;
mod store;

pub use document::{ProgressDocument, ProgressRecord, PROGRESS_VERSION};
pub use error::ProgressStoreError;
pub use paths::{progress_file, PROGRESS_DIR, PROGRESS_FILE};
pub use store::ProgressStore;
