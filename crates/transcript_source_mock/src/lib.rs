//! Deterministic scripted implementation of the shared `transcript_source`
//! contract.
//!
//! This crate contains no transport or DOM logic and is intended for local
//! development and contract-level integration testing.

use std::collections::{HashMap, VecDeque};

use transcript_source::{Message, SourceError, TranscriptSource};

/// Stable source identifier used for explicit startup selection.
pub const MOCK_SOURCE_ID: &str = "mock";

/// Scripted transcript source used by watcher tests and local runs.
///
/// Sweeps queue whole-transcript snapshots: each `fetch_messages` call pops
/// the next one and keeps serving the last snapshot once the queue drains.
/// Revisions queue per-message rewrites that take effect on the next
/// `message_text` resample, which is how callers exercise still-streaming
/// messages without a live source.
#[derive(Debug, Default)]
pub struct MockSource {
    sweeps: VecDeque<Vec<Message>>,
    current: Vec<Message>,
    revisions: HashMap<String, VecDeque<String>>,
    snippets: HashMap<(String, usize), String>,
    fetch_failures: VecDeque<SourceError>,
    text_failures: VecDeque<SourceError>,
    snippet_failures: VecDeque<SourceError>,
    send_failures: VecDeque<SourceError>,
    sent: Vec<String>,
}

impl MockSource {
    /// Creates a source with nothing scripted; fetches return an empty
    /// transcript until a sweep is queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a transcript snapshot for a later `fetch_messages` call.
    #[must_use]
    pub fn with_sweep(mut self, messages: Vec<Message>) -> Self {
        self.push_sweep(messages);
        self
    }

    /// Registers the code block served for `copy_snippet(id, index)`.
    #[must_use]
    pub fn with_snippet(
        mut self,
        id: impl Into<String>,
        index: usize,
        content: impl Into<String>,
    ) -> Self {
        self.set_snippet(id, index, content);
        self
    }

    /// Queues a transcript snapshot for a later `fetch_messages` call.
    pub fn push_sweep(&mut self, messages: Vec<Message>) {
        self.sweeps.push_back(messages);
    }

    /// Queues a rewrite of one message's text, applied on its next resample.
    pub fn push_revision(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.revisions
            .entry(id.into())
            .or_default()
            .push_back(text.into());
    }

    /// Registers the code block served for `copy_snippet(id, index)`.
    pub fn set_snippet(&mut self, id: impl Into<String>, index: usize, content: impl Into<String>) {
        self.snippets.insert((id.into(), index), content.into());
    }

    /// Queues a failure returned by the next `fetch_messages` call.
    pub fn push_fetch_failure(&mut self, error: SourceError) {
        self.fetch_failures.push_back(error);
    }

    /// Queues a failure returned by the next `message_text` call.
    pub fn push_text_failure(&mut self, error: SourceError) {
        self.text_failures.push_back(error);
    }

    /// Queues a failure returned by the next `copy_snippet` call.
    pub fn push_snippet_failure(&mut self, error: SourceError) {
        self.snippet_failures.push_back(error);
    }

    /// Queues a failure returned by the next `send_text` call.
    pub fn push_send_failure(&mut self, error: SourceError) {
        self.send_failures.push_back(error);
    }

    /// Returns every payload accepted by `send_text`, oldest first.
    #[must_use]
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl TranscriptSource for MockSource {
    fn fetch_messages(&mut self) -> Result<Vec<Message>, SourceError> {
        if let Some(error) = self.fetch_failures.pop_front() {
            return Err(error);
        }

        if let Some(next) = self.sweeps.pop_front() {
            self.current = next;
        }
        Ok(self.current.clone())
    }

    fn message_text(&mut self, id: &str) -> Result<String, SourceError> {
        if let Some(error) = self.text_failures.pop_front() {
            return Err(error);
        }

        if let Some(queue) = self.revisions.get_mut(id) {
            if let Some(text) = queue.pop_front() {
                if let Some(message) = self.current.iter_mut().find(|message| message.id == id) {
                    message.text = text.clone();
                }
                return Ok(text);
            }
        }

        self.current
            .iter()
            .find(|message| message.id == id)
            .map(|message| message.text.clone())
            .ok_or_else(|| SourceError::unknown_message(id))
    }

    fn copy_snippet(&mut self, id: &str, index: usize) -> Result<String, SourceError> {
        if let Some(error) = self.snippet_failures.pop_front() {
            return Err(error);
        }

        if !self.current.iter().any(|message| message.id == id) {
            return Err(SourceError::unknown_message(id));
        }

        self.snippets
            .get(&(id.to_string(), index))
            .cloned()
            .ok_or_else(|| SourceError::missing_snippet(id, index))
    }

    fn send_text(&mut self, text: &str) -> Result<(), SourceError> {
        if let Some(error) = self.send_failures.pop_front() {
            return Err(error);
        }

        self.sent.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use transcript_source::{Message, SourceError, TranscriptSource};

    use super::MockSource;

    #[test]
    fn fetch_advances_through_sweeps_then_repeats_the_last() {
        let mut source = MockSource::new()
            .with_sweep(vec![Message::new("m1", "first")])
            .with_sweep(vec![Message::new("m1", "first"), Message::new("m2", "second")]);

        assert_eq!(
            source.fetch_messages().expect("first sweep"),
            vec![Message::new("m1", "first")]
        );
        assert_eq!(
            source.fetch_messages().expect("second sweep").len(),
            2
        );
        assert_eq!(
            source.fetch_messages().expect("drained queue repeats").len(),
            2
        );
    }

    #[test]
    fn revision_applies_on_resample_and_sticks() {
        let mut source = MockSource::new().with_sweep(vec![Message::new("m1", "partial")]);
        source.push_revision("m1", "partial plus more");

        source.fetch_messages().expect("sweep");
        assert_eq!(
            source.message_text("m1").expect("revised resample"),
            "partial plus more"
        );
        assert_eq!(
            source.message_text("m1").expect("settled resample"),
            "partial plus more"
        );
        assert_eq!(
            source.fetch_messages().expect("fetch sees the revision"),
            vec![Message::new("m1", "partial plus more")]
        );
    }

    #[test]
    fn resampling_an_unknown_id_reports_unknown_message() {
        let mut source = MockSource::new().with_sweep(vec![Message::new("m1", "text")]);
        source.fetch_messages().expect("sweep");

        assert_eq!(
            source.message_text("m9"),
            Err(SourceError::unknown_message("m9"))
        );
    }

    #[test]
    fn copy_snippet_requires_a_visible_message() {
        let mut source = MockSource::new().with_snippet("m1", 0, "fn main() {}");

        assert_eq!(
            source.copy_snippet("m1", 0),
            Err(SourceError::unknown_message("m1"))
        );

        source.push_sweep(vec![Message::new("m1", "with code")]);
        source.fetch_messages().expect("sweep");
        assert_eq!(
            source.copy_snippet("m1", 0).expect("registered block"),
            "fn main() {}"
        );
        assert_eq!(
            source.copy_snippet("m1", 1),
            Err(SourceError::missing_snippet("m1", 1))
        );
    }

    #[test]
    fn send_text_records_payloads_and_honors_queued_failures() {
        let mut source = MockSource::new();
        source.push_send_failure(SourceError::transport("socket closed"));

        assert_eq!(
            source.send_text("lost"),
            Err(SourceError::transport("socket closed"))
        );
        source.send_text("kept").expect("second send succeeds");
        assert_eq!(source.sent(), ["kept".to_string()]);
    }

    #[test]
    fn queued_fetch_failure_is_returned_once() {
        let mut source = MockSource::new().with_sweep(vec![Message::new("m1", "text")]);
        source.push_fetch_failure(SourceError::timeout("no response"));

        assert_eq!(
            source.fetch_messages(),
            Err(SourceError::timeout("no response"))
        );
        assert_eq!(
            source.fetch_messages().expect("retry succeeds"),
            vec![Message::new("m1", "text")]
        );
    }

    #[test]
    fn queued_text_and_snippet_failures_are_returned_once() {
        let mut source = MockSource::new()
            .with_sweep(vec![Message::new("m1", "text")])
            .with_snippet("m1", 0, "block");
        source.push_text_failure(SourceError::stale("detached"));
        source.push_snippet_failure(SourceError::timeout("clipboard slow"));
        source.fetch_messages().expect("sweep");

        assert_eq!(source.message_text("m1"), Err(SourceError::stale("detached")));
        assert_eq!(source.message_text("m1").expect("retry succeeds"), "text");
        assert_eq!(
            source.copy_snippet("m1", 0),
            Err(SourceError::timeout("clipboard slow"))
        );
        assert_eq!(source.copy_snippet("m1", 0).expect("retry succeeds"), "block");
    }
}
