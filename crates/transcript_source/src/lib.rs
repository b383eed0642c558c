//! Minimal source-agnostic contract for reading a live conversation transcript.
//!
//! This crate intentionally defines only the message snapshot, snippet, and
//! reply-channel contract types. It excludes transport details, DOM or wire
//! payloads, and polling policy, which belong to source implementations and
//! their callers.

use std::fmt;

/// One assistant-authored transcript message at a point in time.
///
/// The id is assigned by the source, stable across fetches, and unique within
/// a conversation. The text is a snapshot and may still be growing when
/// sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub text: String,
}

impl Message {
    /// Creates a message snapshot.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Error reported by a transcript source operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The transport to the source failed (connection, protocol, server).
    Transport { message: String },
    /// A previously located element went stale mid-operation.
    Stale { message: String },
    /// The source did not answer within its deadline.
    Timeout { message: String },
    /// No currently visible message carries the requested id.
    UnknownMessage { id: String },
    /// The message is visible but has no code block at the requested index.
    MissingSnippet { id: String, index: usize },
}

impl SourceError {
    /// Constructs a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Constructs a stale-element failure.
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::Stale {
            message: message.into(),
        }
    }

    /// Constructs a deadline failure.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Constructs an unknown-message failure.
    #[must_use]
    pub fn unknown_message(id: impl Into<String>) -> Self {
        Self::UnknownMessage { id: id.into() }
    }

    /// Constructs a missing-snippet failure.
    #[must_use]
    pub fn missing_snippet(id: impl Into<String>, index: usize) -> Self {
        Self::MissingSnippet {
            id: id.into(),
            index,
        }
    }

    /// Returns true when retrying the same operation on a later cycle may
    /// succeed without any corrective step.
    ///
    /// A missing snippet is not transient: the message was already observed
    /// stable, so a code block absent now stays absent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Stale { .. }
                | Self::Timeout { .. }
                | Self::UnknownMessage { .. }
        )
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { message } => write!(f, "source transport error: {message}"),
            Self::Stale { message } => write!(f, "stale transcript element: {message}"),
            Self::Timeout { message } => write!(f, "source timed out: {message}"),
            Self::UnknownMessage { id } => write!(f, "no visible message with id '{id}'"),
            Self::MissingSnippet { id, index } => {
                write!(f, "message '{id}' has no code block at index {index}")
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Read/write interface to one live conversation transcript.
///
/// Implementations take `&mut self` because real sources keep cursors and
/// element caches; the caller owns the source and drives it from one thread.
pub trait TranscriptSource {
    /// Returns every currently visible assistant message in document order.
    fn fetch_messages(&mut self) -> Result<Vec<Message>, SourceError>;

    /// Re-reads the current text of one message by id.
    fn message_text(&mut self, id: &str) -> Result<String, SourceError>;

    /// Returns the contents of the code block at `index` within a message,
    /// counted from zero in document order.
    fn copy_snippet(&mut self, id: &str, index: usize) -> Result<String, SourceError>;

    /// Appends text to the conversation as new user input.
    fn send_text(&mut self, text: &str) -> Result<(), SourceError>;

    /// Releases any session held against the source. Further calls after a
    /// successful close may fail; sources that hold nothing accept this as a
    /// no-op.
    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}
