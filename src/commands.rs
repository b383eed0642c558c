use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

fn action_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"\[ACTION\][ \t]*(\w+)").expect("action regex must compile")
    })
}

fn data_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"\[DATA\][ \t]*([^\r\n]+)").expect("data regex must compile")
    })
}

/// A raw directive lifted out of one message: the action word plus whatever
/// fields the data tag carried. Only the first occurrence of each tag is
/// honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub action: String,
    pub fields: BTreeMap<String, String>,
    pub field_error: Option<FieldFormatError>,
}

/// A data segment that is not `key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFormatError {
    pub segment: String,
}

impl fmt::Display for FieldFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed data segment '{}': expected key=value",
            self.segment
        )
    }
}

impl std::error::Error for FieldFormatError {}

/// Why a directive could not become a typed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownAction {
        action: String,
    },
    MissingField {
        field: &'static str,
    },
    InvalidField {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    /// PATCH_FILE without a replace group or insert group.
    EmptyPatch,
    MalformedFields(FieldFormatError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAction { action } => write!(f, "unknown action '{action}'"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::InvalidField {
                field,
                value,
                expected,
            } => write!(f, "field '{field}' has invalid value '{value}': expected {expected}"),
            Self::EmptyPatch => write!(f, "PATCH_FILE carries no replace or insert fields"),
            Self::MalformedFields(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Replace the region between two markers; the markers stay in the file.
/// `content` is inline replacement text; absent means the message's code
/// block supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEdit {
    pub start: String,
    pub end: String,
    pub content: Option<String>,
}

/// Insert a line relative to every line carrying the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertEdit {
    pub anchor: String,
    pub content: String,
}

/// A fully validated file action ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddFile {
        path: String,
        content: Option<String>,
        snippet: Option<usize>,
    },
    PatchFile {
        path: String,
        replace: Option<RegionEdit>,
        insert_before: Option<InsertEdit>,
        insert_after: Option<InsertEdit>,
        snippet: Option<usize>,
    },
    ReadFile {
        path: String,
    },
}

impl Command {
    /// Builds the typed command, rejecting unknown actions and unusable
    /// field sets at this boundary so execution never sees them.
    pub fn from_directive(directive: Directive) -> Result<Self, CommandError> {
        if let Some(error) = directive.field_error {
            return Err(CommandError::MalformedFields(error));
        }

        let fields = &directive.fields;
        match directive.action.as_str() {
            "ADD_FILE" => {
                let path = require_value(fields, "path")?.to_string();
                let content = fields.get("content").cloned();
                let snippet = parse_snippet(fields)?;
                Ok(Self::AddFile {
                    path,
                    content,
                    snippet,
                })
            }
            "PATCH_FILE" => {
                let path = require_value(fields, "path")?.to_string();
                let snippet = parse_snippet(fields)?;

                let replace = match (fields.get("start"), fields.get("end")) {
                    (None, None) => None,
                    (Some(_), None) => return Err(CommandError::MissingField { field: "end" }),
                    (None, Some(_)) => return Err(CommandError::MissingField { field: "start" }),
                    (Some(_), Some(_)) => {
                        let start = require_value(fields, "start")?.to_string();
                        let end = require_value(fields, "end")?.to_string();
                        let content = fields.get("content").cloned();
                        if content.is_none() && snippet.is_none() {
                            return Err(CommandError::MissingField { field: "content" });
                        }
                        Some(RegionEdit {
                            start,
                            end,
                            content,
                        })
                    }
                };
                let insert_before = parse_insert(fields, "before", "before_content")?;
                let insert_after = parse_insert(fields, "after", "after_content")?;

                if replace.is_none() && insert_before.is_none() && insert_after.is_none() {
                    return Err(CommandError::EmptyPatch);
                }
                Ok(Self::PatchFile {
                    path,
                    replace,
                    insert_before,
                    insert_after,
                    snippet,
                })
            }
            "READ_FILE" => {
                let path = require_value(fields, "path")?.to_string();
                Ok(Self::ReadFile { path })
            }
            _ => Err(CommandError::UnknownAction {
                action: directive.action,
            }),
        }
    }

    /// Wire name of the action, for logging.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::AddFile { .. } => "ADD_FILE",
            Self::PatchFile { .. } => "PATCH_FILE",
            Self::ReadFile { .. } => "READ_FILE",
        }
    }

    /// Code block index this command still needs fetched, if any. Inline
    /// content always wins over a snippet reference.
    #[must_use]
    pub fn needs_snippet(&self) -> Option<usize> {
        match self {
            Self::AddFile {
                content: None,
                snippet: Some(index),
                ..
            } => Some(*index),
            Self::PatchFile {
                replace: Some(edit),
                snippet: Some(index),
                ..
            } if edit.content.is_none() => Some(*index),
            _ => None,
        }
    }
}

/// Finds the first action and data tags in a message.
///
/// Returns `None` when no action tag is present. A malformed data blob does
/// not suppress the directive: the fields come back empty and the error
/// rides along for the caller to log.
pub fn extract_directive(text: &str) -> Option<Directive> {
    let action = action_regex()
        .captures(text)?
        .get(1)
        .map(|word| word.as_str().to_string())?;

    let mut fields = BTreeMap::new();
    let mut field_error = None;
    if let Some(captures) = data_regex().captures(text) {
        let blob = captures.get(1).map(|blob| blob.as_str()).unwrap_or("");
        match parse_fields(blob) {
            Ok(parsed) => fields = parsed,
            Err(error) => field_error = Some(error),
        }
    }

    Some(Directive {
        action,
        fields,
        field_error,
    })
}

fn parse_fields(blob: &str) -> Result<BTreeMap<String, String>, FieldFormatError> {
    let mut fields = BTreeMap::new();
    for segment in blob.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        // Values may contain '=': only the first one splits.
        let Some((key, value)) = segment.split_once('=') else {
            return Err(FieldFormatError {
                segment: segment.to_string(),
            });
        };
        fields.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(fields)
}

fn require_value<'a>(
    fields: &'a BTreeMap<String, String>,
    field: &'static str,
) -> Result<&'a str, CommandError> {
    match fields.get(field) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(CommandError::InvalidField {
            field,
            value: String::new(),
            expected: "a non-empty value",
        }),
        None => Err(CommandError::MissingField { field }),
    }
}

fn parse_insert(
    fields: &BTreeMap<String, String>,
    anchor_field: &'static str,
    content_field: &'static str,
) -> Result<Option<InsertEdit>, CommandError> {
    if !fields.contains_key(anchor_field) {
        return Ok(None);
    }
    let anchor = require_value(fields, anchor_field)?.to_string();
    let content = fields
        .get(content_field)
        .cloned()
        .ok_or(CommandError::MissingField {
            field: content_field,
        })?;
    Ok(Some(InsertEdit { anchor, content }))
}

fn parse_snippet(fields: &BTreeMap<String, String>) -> Result<Option<usize>, CommandError> {
    let Some(value) = fields.get("snippet") else {
        return Ok(None);
    };
    // Bare `snippet` (empty value) means the first code block.
    if value.is_empty() {
        return Ok(Some(0));
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| CommandError::InvalidField {
            field: "snippet",
            value: value.clone(),
            expected: "a code block index",
        })
}
