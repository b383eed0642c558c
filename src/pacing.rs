use std::thread;
use std::time::Duration;

/// Where the loop waits. Injecting the wait keeps stability sampling and
/// sweep pacing testable without real sleeps.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

/// Production pacer: blocks the watcher thread.
#[derive(Debug, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Test pacer: records every requested pause and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pub pauses: Vec<Duration>,
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_pacer_captures_pauses_in_order() {
        let mut pacer = RecordingPacer::default();

        pacer.pause(Duration::from_secs(1));
        pacer.pause(Duration::from_millis(250));

        assert_eq!(
            pacer.pauses,
            vec![Duration::from_secs(1), Duration::from_millis(250)]
        );
    }
}
