use std::path::{Path, PathBuf};

pub const PROGRESS_DIR: &str = ".chat_scribe";
pub const PROGRESS_FILE: &str = "progress.json";

/// Default progress file location under a repository root.
#[must_use]
pub fn progress_file(repo_root: &Path) -> PathBuf {
    repo_root.join(PROGRESS_DIR).join(PROGRESS_FILE)
}
