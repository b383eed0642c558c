use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::time::Duration;

use patch_engine::{apply_patches, change_summary, PatchSpec};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::commands::Command;

const DEFAULT_FORMATTER_TIMEOUT_SEC: u64 = 30;
const DEFAULT_READ_MAX_BYTES: usize = 200 * 1024;

/// Result of executing one command. Outcomes are values: failures here are
/// reported back into the transcript, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub ok: bool,
    pub detail: String,
}

impl ActionOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// External formatter invoked on a file after a successful patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Formatter {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_FORMATTER_TIMEOUT_SEC),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Applies commands to files under one repository root.
///
/// Every path, relative or absolute, must resolve inside the root; anything
/// escaping it is rejected before the filesystem is touched.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    repo_root: PathBuf,
    formatter: Option<Formatter>,
    read_max_bytes: usize,
}

impl ActionExecutor {
    pub fn new(repo_root: impl Into<PathBuf>) -> Result<Self, String> {
        let repo_root = repo_root.into();
        let canonical_root = repo_root
            .canonicalize()
            .map_err(|error| format!("Failed to resolve repository root: {error}"))?;

        if !canonical_root.is_dir() {
            return Err("Repository root must be a directory".to_string());
        }

        Ok(Self {
            repo_root: canonical_root,
            formatter: None,
            read_max_bytes: DEFAULT_READ_MAX_BYTES,
        })
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Runs one command. `snippet` carries code-block content already fetched
    /// for commands whose inline content was absent.
    pub fn execute(&mut self, command: &Command, snippet: Option<&str>) -> ActionOutcome {
        match command {
            Command::AddFile { path, content, .. } => {
                let content = content.as_deref().or(snippet).unwrap_or("");
                self.execute_add_file(path, content)
            }
            Command::PatchFile {
                path,
                replace,
                insert_before,
                insert_after,
                ..
            } => {
                let mut specs = Vec::new();
                if let Some(edit) = replace {
                    let new_content = edit.content.as_deref().or(snippet).unwrap_or("");
                    specs.push(PatchSpec::RegionReplace {
                        start_marker: edit.start.clone(),
                        end_marker: edit.end.clone(),
                        new_content: new_content.to_string(),
                    });
                }
                if let Some(edit) = insert_before {
                    specs.push(PatchSpec::InsertBefore {
                        anchor: edit.anchor.clone(),
                        content: edit.content.clone(),
                    });
                }
                if let Some(edit) = insert_after {
                    specs.push(PatchSpec::InsertAfter {
                        anchor: edit.anchor.clone(),
                        content: edit.content.clone(),
                    });
                }
                self.execute_patch_file(path, &specs)
            }
            Command::ReadFile { path } => self.execute_read_file(path),
        }
    }

    fn execute_add_file(&self, path: &str, content: &str) -> ActionOutcome {
        let resolved = match self.resolve_write_path(path) {
            Ok(path) => path,
            Err(error) => return ActionOutcome::fail(error),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                return ActionOutcome::fail(format!(
                    "Failed to create parent directories {}: {error}",
                    parent.display()
                ));
            }

            let canonical_parent = match parent.canonicalize() {
                Ok(path) => path,
                Err(error) => {
                    return ActionOutcome::fail(format!(
                        "Failed to resolve write parent {}: {error}",
                        parent.display()
                    ));
                }
            };

            if let Err(error) = self.ensure_inside_root(&canonical_parent) {
                return ActionOutcome::fail(error);
            }
        }

        if let Err(error) = fs::write(&resolved, content) {
            return ActionOutcome::fail(format!(
                "Failed to write file {}: {error}",
                resolved.display()
            ));
        }

        ActionOutcome::ok(format!("Wrote {}", self.root_relative_display(&resolved)))
    }

    fn execute_patch_file(&self, path: &str, specs: &[PatchSpec]) -> ActionOutcome {
        let resolved = match self.resolve_existing_path(path) {
            Ok(path) => path,
            Err(error) => return ActionOutcome::fail(error),
        };

        let current = match fs::read_to_string(&resolved) {
            Ok(content) => content,
            Err(error) => {
                return ActionOutcome::fail(format!(
                    "Failed to read file {}: {error}",
                    resolved.display()
                ));
            }
        };

        let updated = match apply_patches(&current, specs) {
            Ok(updated) => updated,
            Err(error) => {
                return ActionOutcome::fail(format!(
                    "Patch failed for {}: {error}",
                    self.root_relative_display(&resolved)
                ));
            }
        };

        if let Err(error) = fs::write(&resolved, &updated) {
            return ActionOutcome::fail(format!(
                "Failed to write file {}: {error}",
                resolved.display()
            ));
        }

        self.run_formatter(&resolved);

        ActionOutcome::ok(format!(
            "Patched {} ({})",
            self.root_relative_display(&resolved),
            change_summary(&current, &updated)
        ))
    }

    fn execute_read_file(&self, path: &str) -> ActionOutcome {
        let resolved = match self.resolve_existing_path(path) {
            Ok(path) => path,
            Err(error) => return ActionOutcome::fail(error),
        };

        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(error) => {
                return ActionOutcome::fail(format!(
                    "Failed to read file {}: {error}",
                    resolved.display()
                ));
            }
        };

        if bytes.len() > self.read_max_bytes {
            return ActionOutcome::fail(format!(
                "File exceeds max read size ({} bytes > {} bytes)",
                bytes.len(),
                self.read_max_bytes
            ));
        }

        match String::from_utf8(bytes) {
            Ok(content) => ActionOutcome::ok(content),
            Err(_) => ActionOutcome::fail("File is not valid UTF-8 text".to_string()),
        }
    }

    /// Formatter problems are logged and swallowed: the patch already
    /// succeeded and the outcome must not change.
    fn run_formatter(&self, path: &Path) {
        let Some(formatter) = &self.formatter else {
            return;
        };

        let mut child = match ProcessCommand::new(&formatter.program)
            .args(&formatter.args)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                warn!(program = %formatter.program, %error, "failed to launch formatter");
                return;
            }
        };

        match child.wait_timeout(formatter.timeout) {
            Ok(Some(status)) if status.success() => {
                debug!(program = %formatter.program, path = %path.display(), "formatter finished");
            }
            Ok(Some(status)) => {
                let stderr = read_pipe(child.stderr.take());
                warn!(
                    program = %formatter.program,
                    code = ?status.code(),
                    stderr = %stderr.trim(),
                    "formatter exited with failure"
                );
            }
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    program = %formatter.program,
                    timeout_sec = formatter.timeout.as_secs(),
                    "formatter timed out and was killed"
                );
            }
            Err(error) => {
                let _ = child.kill();
                warn!(program = %formatter.program, %error, "failed waiting for formatter");
            }
        }
    }

    fn resolve_existing_path(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("Path must not be empty".to_string());
        }

        let candidate = self.absolute_candidate(path);
        let canonical = candidate
            .canonicalize()
            .map_err(|error| format!("Failed to resolve path {}: {error}", candidate.display()))?;

        self.ensure_inside_root(&canonical)?;
        Ok(canonical)
    }

    fn resolve_write_path(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("Path must not be empty".to_string());
        }

        let candidate = self.absolute_candidate(path);
        let parent = candidate.parent().ok_or_else(|| {
            format!(
                "Path {} has no parent directory and cannot be written safely",
                candidate.display()
            )
        })?;

        let anchor = canonicalize_existing_ancestor(parent)?;
        self.ensure_inside_root(&anchor)?;

        Ok(candidate)
    }

    fn absolute_candidate(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        }
    }

    fn ensure_inside_root(&self, canonical_path: &Path) -> Result<(), String> {
        if canonical_path.starts_with(&self.repo_root) {
            Ok(())
        } else {
            Err(format!(
                "Path escapes repository root: {}",
                canonical_path.display()
            ))
        }
    }

    fn root_relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.repo_root)
            .map(|relative| relative.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

fn read_pipe(pipe: Option<impl Read>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };

    let mut bytes = Vec::new();
    let _ = pipe.read_to_end(&mut bytes);
    String::from_utf8_lossy(&bytes).into_owned()
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, String> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor.canonicalize().map_err(|error| {
                format!("Failed to resolve path {}: {error}", ancestor.display())
            });
        }
    }

    Err(format!(
        "No existing ancestor found for path {}",
        path.display()
    ))
}
