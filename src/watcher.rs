use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use progress_store::ProgressStore;
use tracing::{debug, info, warn};
use transcript_source::{Message, TranscriptSource};

use crate::actions::{ActionExecutor, ActionOutcome};
use crate::commands::{extract_directive, Command};
use crate::pacing::Pacer;

const DEFAULT_STABILITY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(5);

/// Exactly-once accounting for one conversation: the in-memory set of every
/// id handled during this run, backed by the persisted resume point.
#[derive(Debug)]
pub struct ProcessedLedger {
    seen: HashSet<String>,
    store: ProgressStore,
    conversation: String,
}

impl ProcessedLedger {
    #[must_use]
    pub fn new(store: ProgressStore, conversation: impl Into<String>) -> Self {
        Self {
            seen: HashSet::new(),
            store,
            conversation: conversation.into(),
        }
    }

    /// Last message id persisted for this conversation, if any.
    #[must_use]
    pub fn resume_point(&self) -> Option<String> {
        self.store
            .last_processed(&self.conversation)
            .map(str::to_string)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Marks an id handled without touching persisted progress. Used while
    /// replaying history at or below the resume point.
    pub fn mark_skipped(&mut self, id: &str) {
        self.seen.insert(id.to_string());
    }

    /// Marks an id handled and advances the persisted resume point. A
    /// persistence failure is logged; the in-memory entry still protects the
    /// rest of this run.
    pub fn commit(&mut self, id: &str) {
        self.seen.insert(id.to_string());
        if let Err(error) = self.store.record(&self.conversation, id) {
            warn!(id, %error, "failed to persist progress");
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &str {
        &self.conversation
    }
}

/// What one sweep did. Consumed by loop logging and by tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Ids newly marked processed this cycle, in document order.
    pub processed: Vec<String>,
    /// Outcome of every command that ran or was refused, paired with its id.
    pub outcomes: Vec<(String, ActionOutcome)>,
    /// Count of messages skipped as already handled.
    pub skipped: usize,
    /// Id of the message that stopped the sweep, when one did.
    pub deferred: Option<String>,
}

enum Handled {
    /// The message is settled; an outcome is present when a command ran or
    /// was refused.
    Done(Option<ActionOutcome>),
    /// A transient failure got in the way; the message retries next cycle.
    Deferred,
}

/// Drives transcript sweeps: stability sampling, command execution, outcome
/// replies, and exactly-once accounting.
///
/// Messages are handled in strict document order. A deferred message stops
/// the sweep so nothing later is processed ahead of it.
pub struct Watcher {
    executor: ActionExecutor,
    ledger: ProcessedLedger,
    stability_delay: Duration,
    cycle_delay: Duration,
}

impl Watcher {
    #[must_use]
    pub fn new(executor: ActionExecutor, ledger: ProcessedLedger) -> Self {
        Self {
            executor,
            ledger,
            stability_delay: DEFAULT_STABILITY_DELAY,
            cycle_delay: DEFAULT_CYCLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_stability_delay(mut self, delay: Duration) -> Self {
        self.stability_delay = delay;
        self
    }

    #[must_use]
    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Sweeps the transcript once.
    pub fn run_cycle(
        &mut self,
        source: &mut dyn TranscriptSource,
        pacer: &mut dyn Pacer,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        let messages = match source.fetch_messages() {
            Ok(messages) => messages,
            Err(error) => {
                warn!(%error, "transcript fetch failed; retrying next cycle");
                return report;
            }
        };

        // Everything up to and including the persisted resume point was
        // handled by an earlier run; it only needs its ledger entry back. A
        // resume point no longer visible replays from the beginning.
        let resume_skip = self
            .ledger
            .resume_point()
            .and_then(|resume_id| {
                messages
                    .iter()
                    .position(|message| message.id == resume_id)
                    .map(|index| index + 1)
            })
            .unwrap_or(0);

        let mut remaining = messages.into_iter();
        for message in remaining.by_ref().take(resume_skip) {
            self.ledger.mark_skipped(&message.id);
            report.skipped += 1;
        }

        for message in remaining {
            if self.ledger.contains(&message.id) {
                report.skipped += 1;
                continue;
            }

            // Two samples of the text must agree before the message counts
            // as finished streaming.
            pacer.pause(self.stability_delay);
            let resampled = match source.message_text(&message.id) {
                Ok(text) => text,
                Err(error) => {
                    debug!(id = %message.id, %error, "resample failed; deferring");
                    report.deferred = Some(message.id);
                    break;
                }
            };
            if resampled != message.text {
                debug!(id = %message.id, "message still streaming; deferring");
                report.deferred = Some(message.id);
                break;
            }

            match self.process_message(source, &message) {
                Handled::Done(outcome) => {
                    if let Some(outcome) = outcome {
                        self.send_outcome(source, &message.id, &outcome);
                        report.outcomes.push((message.id.clone(), outcome));
                    }
                    self.ledger.commit(&message.id);
                    report.processed.push(message.id);
                }
                Handled::Deferred => {
                    report.deferred = Some(message.id);
                    break;
                }
            }
        }

        report
    }

    /// Sweeps until `shutdown` is set, pausing the cycle delay in between.
    /// Per-cycle failures never end the loop; only the flag does.
    pub fn run(
        &mut self,
        source: &mut dyn TranscriptSource,
        pacer: &mut dyn Pacer,
        shutdown: &AtomicBool,
    ) {
        info!(
            conversation = self.ledger.conversation(),
            repo_root = %self.executor.repo_root().display(),
            "watcher started"
        );

        loop {
            let report = self.run_cycle(source, pacer);
            info!(
                processed = report.processed.len(),
                skipped = report.skipped,
                deferred = report.deferred.as_deref().unwrap_or("-"),
                "cycle finished"
            );

            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            pacer.pause(self.cycle_delay);
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
        }

        if let Err(error) = source.close() {
            warn!(%error, "failed to close transcript source");
        }
        info!("watcher stopped");
    }

    fn process_message(
        &mut self,
        source: &mut dyn TranscriptSource,
        message: &Message,
    ) -> Handled {
        let Some(directive) = extract_directive(&message.text) else {
            return Handled::Done(None);
        };

        let command = match Command::from_directive(directive) {
            Ok(command) => command,
            Err(error) => {
                warn!(id = %message.id, %error, "rejected directive");
                return Handled::Done(None);
            }
        };

        // Snippet content is fetched before any side effect so a transient
        // source failure defers the whole message instead of half-applying
        // it.
        let snippet = match command.needs_snippet() {
            Some(index) => match source.copy_snippet(&message.id, index) {
                Ok(content) => Some(content),
                Err(error) if error.is_transient() => {
                    debug!(id = %message.id, %error, "snippet fetch failed; deferring");
                    return Handled::Deferred;
                }
                Err(error) => {
                    warn!(id = %message.id, %error, "snippet unavailable");
                    return Handled::Done(Some(ActionOutcome::fail(format!(
                        "Snippet unavailable: {error}"
                    ))));
                }
            },
            None => None,
        };

        let outcome = self.executor.execute(&command, snippet.as_deref());
        info!(
            id = %message.id,
            action = command.action(),
            ok = outcome.ok,
            "command executed"
        );
        Handled::Done(Some(outcome))
    }

    /// Reports an outcome back into the conversation. A failed send is
    /// logged only: the action already happened and must still be recorded
    /// as processed.
    fn send_outcome(
        &mut self,
        source: &mut dyn TranscriptSource,
        id: &str,
        outcome: &ActionOutcome,
    ) {
        let status = if outcome.ok { "ok" } else { "error" };
        let reply = format!("RESULT {status}: {}", outcome.detail);
        if let Err(error) = source.send_text(&reply) {
            warn!(id, %error, "failed to send outcome reply");
        }
    }
}
