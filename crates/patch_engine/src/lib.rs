//! Pure text patch engine for marker-delimited edits.
//!
//! Specs operate on literal substrings only. There is no pattern language:
//! markers and anchors match by plain leftmost substring search, so regex
//! metacharacters carry no special meaning and need no escaping.

use similar::{ChangeTag, TextDiff};
use thiserror::Error;

/// One edit to apply to a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSpec {
    /// Replaces the text strictly between the first `start_marker` and the
    /// first `end_marker` found after it. Both markers stay in place.
    RegionReplace {
        start_marker: String,
        end_marker: String,
        new_content: String,
    },
    /// Inserts `content` on its own line immediately above every line that
    /// contains `anchor`.
    InsertBefore { anchor: String, content: String },
    /// Inserts `content` on its own line immediately below every line that
    /// contains `anchor`.
    InsertAfter { anchor: String, content: String },
}

/// Failure to locate a marker or anchor.
///
/// `apply_patches` returns either the fully patched text or this error;
/// partially applied output is never produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("start marker {start_marker:?} not found")]
    StartMarkerNotFound { start_marker: String },

    #[error("end marker {end_marker:?} not found after start marker {start_marker:?}")]
    EndMarkerNotFound {
        start_marker: String,
        end_marker: String,
    },

    #[error("anchor {anchor:?} not found on any line")]
    AnchorNotFound { anchor: String },
}

#[derive(Debug, Clone, Copy)]
enum Placement {
    Before,
    After,
}

/// Applies `specs` to `content` and returns the patched text.
///
/// Application order is fixed regardless of the order given: every
/// `RegionReplace` first, then every `InsertBefore`, then every
/// `InsertAfter`. Later specs observe the output of earlier ones.
pub fn apply_patches(content: &str, specs: &[PatchSpec]) -> Result<String, PatchError> {
    let mut patched = content.to_string();
    for spec in ordered(specs) {
        patched = apply_one(&patched, spec)?;
    }

    Ok(patched)
}

/// Returns a compact `+added -removed lines` summary of a text change.
#[must_use]
pub fn change_summary(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut added = 0usize;
    let mut removed = 0usize;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    format!("+{added} -{removed} lines")
}

fn ordered(specs: &[PatchSpec]) -> impl Iterator<Item = &PatchSpec> {
    let replaces = specs
        .iter()
        .filter(|spec| matches!(spec, PatchSpec::RegionReplace { .. }));
    let befores = specs
        .iter()
        .filter(|spec| matches!(spec, PatchSpec::InsertBefore { .. }));
    let afters = specs
        .iter()
        .filter(|spec| matches!(spec, PatchSpec::InsertAfter { .. }));

    replaces.chain(befores).chain(afters)
}

fn apply_one(content: &str, spec: &PatchSpec) -> Result<String, PatchError> {
    match spec {
        PatchSpec::RegionReplace {
            start_marker,
            end_marker,
            new_content,
        } => replace_region(content, start_marker, end_marker, new_content),
        PatchSpec::InsertBefore {
            anchor,
            content: inserted,
        } => insert_at_anchor(content, anchor, inserted, Placement::Before),
        PatchSpec::InsertAfter {
            anchor,
            content: inserted,
        } => insert_at_anchor(content, anchor, inserted, Placement::After),
    }
}

fn replace_region(
    content: &str,
    start_marker: &str,
    end_marker: &str,
    new_content: &str,
) -> Result<String, PatchError> {
    let start = content
        .find(start_marker)
        .ok_or_else(|| PatchError::StartMarkerNotFound {
            start_marker: start_marker.to_string(),
        })?;
    let after_start = start + start_marker.len();
    let end_offset =
        content[after_start..]
            .find(end_marker)
            .ok_or_else(|| PatchError::EndMarkerNotFound {
                start_marker: start_marker.to_string(),
                end_marker: end_marker.to_string(),
            })?;
    let end = after_start + end_offset;

    let mut patched = String::with_capacity(content.len() + new_content.len());
    patched.push_str(&content[..after_start]);
    patched.push_str(new_content);
    patched.push_str(&content[end..]);
    Ok(patched)
}

fn insert_at_anchor(
    content: &str,
    anchor: &str,
    inserted: &str,
    placement: Placement,
) -> Result<String, PatchError> {
    let mut matched = false;
    let mut patched = String::with_capacity(content.len() + inserted.len());

    for line in content.split_inclusive('\n') {
        let line_text = line.strip_suffix('\n').unwrap_or(line);
        let line_text = line_text.strip_suffix('\r').unwrap_or(line_text);
        if !line_text.contains(anchor) {
            patched.push_str(line);
            continue;
        }

        matched = true;
        match placement {
            Placement::Before => {
                patched.push_str(inserted);
                patched.push('\n');
                patched.push_str(line);
            }
            Placement::After => {
                patched.push_str(line);
                if line.ends_with('\n') {
                    patched.push_str(inserted);
                    patched.push('\n');
                } else {
                    // Final line without a terminator gains one before the insertion.
                    patched.push('\n');
                    patched.push_str(inserted);
                }
            }
        }
    }

    if !matched {
        return Err(PatchError::AnchorNotFound {
            anchor: anchor.to_string(),
        });
    }

    Ok(patched)
}
