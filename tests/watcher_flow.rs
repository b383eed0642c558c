use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chat_scribe::{ActionExecutor, ProcessedLedger, RecordingPacer, Watcher};
use progress_store::ProgressStore;
use tempfile::tempdir;
use transcript_source::{Message, SourceError};
use transcript_source_mock::MockSource;

fn new_watcher(repo_root: &Path, progress_path: &Path) -> Watcher {
    let executor = ActionExecutor::new(repo_root).expect("repository root should be valid");
    let ledger = ProcessedLedger::new(ProgressStore::open(progress_path), "chat-1");
    Watcher::new(executor, ledger).with_stability_delay(Duration::from_secs(1))
}

fn add_file_message(id: &str, path: &str, content: &str) -> Message {
    Message::new(
        id,
        format!("[ACTION] ADD_FILE\n[DATA] path={path}; content={content}"),
    )
}

#[test]
fn a_stable_directive_is_executed_once_and_answered() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "hi")]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.deferred, None);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].1.ok);

    let written = fs::read_to_string(repo.path().join("a.txt")).expect("written file");
    assert_eq!(written, "hi");
    assert_eq!(source.sent(), ["RESULT ok: Wrote a.txt".to_string()]);
    assert_eq!(pacer.pauses, vec![Duration::from_secs(1)]);
}

#[test]
fn a_processed_message_is_not_executed_again() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "hi")]);

    watcher.run_cycle(&mut source, &mut pacer);
    let second = watcher.run_cycle(&mut source, &mut pacer);

    assert!(second.processed.is_empty());
    assert_eq!(second.skipped, 1);
    assert_eq!(source.sent().len(), 1);
    // No second stability pause either: the ledger hit skips before sampling.
    assert_eq!(pacer.pauses.len(), 1);
}

#[test]
fn a_still_streaming_message_defers_and_stops_the_sweep() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();

    let mut source = MockSource::new().with_sweep(vec![
        Message::new("m1", "[ACTION] ADD_FILE\n[DATA] path=one.txt; content=fir"),
        add_file_message("m2", "two.txt", "later"),
    ]);
    source.push_revision("m1", "[ACTION] ADD_FILE\n[DATA] path=one.txt; content=first");

    let first = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(first.deferred, Some("m1".to_string()));
    assert!(first.processed.is_empty());
    assert!(!repo.path().join("one.txt").exists());
    assert!(!repo.path().join("two.txt").exists());

    // The next fetch serves the settled text; both messages go through in
    // document order.
    let second = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(second.deferred, None);
    assert_eq!(second.processed, vec!["m1".to_string(), "m2".to_string()]);
    let one = fs::read_to_string(repo.path().join("one.txt")).expect("one.txt");
    assert_eq!(one, "first");
    let two = fs::read_to_string(repo.path().join("two.txt")).expect("two.txt");
    assert_eq!(two, "later");
}

#[test]
fn resume_skips_history_at_and_below_the_persisted_cutoff() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    ProgressStore::open(&progress)
        .record("chat-1", "m2")
        .expect("seed progress");

    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![
        add_file_message("m1", "one.txt", "a"),
        add_file_message("m2", "two.txt", "b"),
        add_file_message("m3", "three.txt", "c"),
    ]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.skipped, 2);
    assert_eq!(report.processed, vec!["m3".to_string()]);
    assert!(!repo.path().join("one.txt").exists());
    assert!(!repo.path().join("two.txt").exists());
    assert!(repo.path().join("three.txt").exists());
    assert_eq!(pacer.pauses.len(), 1);
}

#[test]
fn restart_resumes_without_replaying_actions() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");

    let mut first_watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "original")]);
    first_watcher.run_cycle(&mut source, &mut pacer);

    // Same id, different payload: a correct resume never re-executes it.
    let mut second_watcher = new_watcher(repo.path(), &progress);
    let mut second_source =
        MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "changed")]);
    let report = second_watcher.run_cycle(&mut second_source, &mut pacer);

    assert_eq!(report.skipped, 1);
    assert!(report.processed.is_empty());
    let written = fs::read_to_string(repo.path().join("a.txt")).expect("written file");
    assert_eq!(written, "original");
}

#[test]
fn a_failed_action_still_settles_the_message() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![Message::new(
        "m1",
        "[ACTION] PATCH_FILE\n[DATA] path=missing.txt; start=A; end=B; content=x",
    )]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!report.outcomes[0].1.ok);
    assert!(source.sent()[0].starts_with("RESULT error:"), "{}", source.sent()[0]);

    // Settled means settled: the failure is not retried.
    let second = watcher.run_cycle(&mut source, &mut pacer);
    assert_eq!(second.skipped, 1);
    assert_eq!(source.sent().len(), 1);
}

#[test]
fn a_snippet_backed_add_pulls_the_code_block() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new()
        .with_sweep(vec![Message::new(
            "m1",
            "[ACTION] ADD_FILE\n[DATA] path=src/demo.rs; snippet=0",
        )])
        .with_snippet("m1", 0, "fn main() {}\n");

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    let written = fs::read_to_string(repo.path().join("src/demo.rs")).expect("written file");
    assert_eq!(written, "fn main() {}\n");
}

#[test]
fn a_transient_snippet_failure_defers_the_message() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new()
        .with_sweep(vec![Message::new(
            "m1",
            "[ACTION] ADD_FILE\n[DATA] path=src/demo.rs; snippet=0",
        )])
        .with_snippet("m1", 0, "fn main() {}\n");
    source.push_snippet_failure(SourceError::transport("clipboard bridge down"));

    let first = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(first.deferred, Some("m1".to_string()));
    assert!(first.processed.is_empty());
    assert!(!repo.path().join("src/demo.rs").exists());

    let second = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(second.processed, vec!["m1".to_string()]);
    assert!(repo.path().join("src/demo.rs").exists());
}

#[test]
fn a_missing_snippet_fails_the_action_without_executing() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![Message::new(
        "m1",
        "[ACTION] ADD_FILE\n[DATA] path=src/demo.rs; snippet=3",
    )]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!report.outcomes[0].1.ok);
    assert!(
        report.outcomes[0].1.detail.contains("Snippet unavailable"),
        "{}",
        report.outcomes[0].1.detail
    );
    assert!(!repo.path().join("src/demo.rs").exists());
}

#[test]
fn messages_without_directives_are_settled_silently() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![Message::new(
        "m1",
        "Here is how the module fits together.",
    )]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    assert!(report.outcomes.is_empty());
    assert!(source.sent().is_empty());
}

#[test]
fn a_malformed_data_blob_settles_the_message_without_acting() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![Message::new(
        "m1",
        "[ACTION] ADD_FILE\n[DATA] path",
    )]);

    let report = watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(report.processed, vec!["m1".to_string()]);
    assert!(report.outcomes.is_empty());
    assert!(source.sent().is_empty());
}

#[test]
fn read_file_sends_the_content_back_into_the_conversation() {
    let repo = tempdir().expect("temp repo");
    fs::write(repo.path().join("notes.txt"), "remember the cutoff").expect("seed file");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![Message::new(
        "m1",
        "[ACTION] READ_FILE\n[DATA] path=notes.txt",
    )]);

    watcher.run_cycle(&mut source, &mut pacer);

    assert_eq!(
        source.sent(),
        ["RESULT ok: remember the cutoff".to_string()]
    );
}

#[test]
fn fetch_failures_leave_the_cycle_empty_and_the_next_one_clean() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "hi")]);
    source.push_fetch_failure(SourceError::timeout("driver busy"));

    let failed = watcher.run_cycle(&mut source, &mut pacer);
    assert!(failed.processed.is_empty());
    assert_eq!(failed.skipped, 0);
    assert!(pacer.pauses.is_empty());

    let recovered = watcher.run_cycle(&mut source, &mut pacer);
    assert_eq!(recovered.processed, vec!["m1".to_string()]);
}

#[test]
fn run_performs_one_cycle_and_closes_when_shutdown_is_set() {
    let repo = tempdir().expect("temp repo");
    let progress = repo.path().join("progress.json");
    let mut watcher = new_watcher(repo.path(), &progress);
    let mut pacer = RecordingPacer::default();
    let mut source = MockSource::new().with_sweep(vec![add_file_message("m1", "a.txt", "hi")]);
    let shutdown = AtomicBool::new(true);

    watcher.run(&mut source, &mut pacer, &shutdown);

    assert!(repo.path().join("a.txt").exists());
    // One stability pause, no inter-cycle pause: the flag stops the loop
    // before it sleeps.
    assert_eq!(pacer.pauses, vec![Duration::from_secs(1)]);
}
