//! # Announcement Module
//!
//! Serializes text-to-speech requests against an asynchronous, single-voice
//! speech engine. Starting a new utterance while one is playing garbles it,
//! so a single drain task pulls one pending announcement at a time and waits
//! for the engine's completion signal before taking the next.
//!
//! The speech engine itself is an injected capability ([`Speaker`]); when no
//! engine is supplied every enqueue degrades to a no-op, so announcements can
//! never block or fail telemetry processing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::mpsc;

/// Error from the speech engine. Announcements are best-effort: this is
/// logged and never surfaced to the operator.
#[derive(Debug, Error)]
pub enum SpeakError {
    /// No speech engine is available on this platform.
    #[error("speech engine unavailable")]
    Unavailable,
    /// The engine accepted the utterance but failed to play it.
    #[error("speech engine failure: {0}")]
    Engine(String),
}

/// Future resolved when an utterance has finished playing (or failed).
pub type SpeakFuture = Pin<Box<dyn Future<Output = Result<(), SpeakError>> + Send>>;

/// Injected text-to-speech capability.
///
/// The returned future must resolve on completion or error, never hang:
/// the drain task holds back the next utterance until it resolves.
pub trait Speaker: Send + Sync {
    fn speak(&self, text: String) -> SpeakFuture;
}

/// At-most-once latches for flight event announcements.
///
/// A status bit stays set across many consecutive frames, so every
/// announcement trigger is gated by a one-way latch: set on first
/// observation, cleared only by an explicit session reset.
#[derive(Debug, Default)]
pub struct EventLatches {
    parachute_flag: bool,
    max_altitude: bool,
    apogee_text: bool,
    parachute_text: bool,
    servo_text: bool,
}

impl EventLatches {
    fn first(flag: &mut bool) -> bool {
        !std::mem::replace(flag, true)
    }

    /// True exactly once: the parachute status bit was observed set.
    pub fn parachute_flag(&mut self) -> bool {
        Self::first(&mut self.parachute_flag)
    }

    /// True exactly once: the maximum altitude report fired.
    pub fn max_altitude(&mut self) -> bool {
        Self::first(&mut self.max_altitude)
    }

    /// True exactly once: an apogee text event was seen.
    pub fn apogee_text(&mut self) -> bool {
        Self::first(&mut self.apogee_text)
    }

    /// True exactly once: a parachute-deploy text event was seen.
    pub fn parachute_text(&mut self) -> bool {
        Self::first(&mut self.parachute_text)
    }

    /// True exactly once: a servo-done text event was seen.
    pub fn servo_text(&mut self) -> bool {
        Self::first(&mut self.servo_text)
    }

    /// Re-arms every latch for a new flight.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// FIFO announcement queue with a single drain task.
///
/// `enqueue` never blocks; the drain task keeps at most one utterance in
/// flight. Must be created inside a Tokio runtime when a speaker is present.
pub struct Announcer {
    speaker: Option<Arc<dyn Speaker>>,
    tx: Option<mpsc::UnboundedSender<String>>,
    stop: Option<Arc<AtomicBool>>,
}

impl Announcer {
    /// Creates the queue and spawns its drain task. With `None` the
    /// announcer is permanently silent.
    #[must_use]
    pub fn new(speaker: Option<Arc<dyn Speaker>>) -> Self {
        let mut announcer = Self {
            speaker,
            tx: None,
            stop: None,
        };
        announcer.spawn_drain();
        announcer
    }

    fn spawn_drain(&mut self) {
        let Some(speaker) = self.speaker.clone() else {
            return;
        };
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if stop_flag.load(Ordering::Acquire) {
                    break;
                }
                debug!("speaking: {text}");
                if let Err(e) = speaker.speak(text).await {
                    warn!("announcement dropped: {e}");
                }
            }
        });
        self.tx = Some(tx);
        self.stop = Some(stop);
    }

    /// Appends an utterance to the pending queue. Never blocks; a no-op when
    /// no speech engine was injected.
    pub fn enqueue(&self, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(text.into());
        }
    }

    /// Abandons undrained items and starts a fresh queue.
    ///
    /// The utterance currently in flight is allowed to finish; the old drain
    /// task exits before taking another item.
    pub fn reset(&mut self) {
        if let Some(stop) = &self.stop {
            stop.store(true, Ordering::Release);
        }
        self.tx = None;
        self.stop = None;
        self.spawn_drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records begin/end markers for each utterance so tests can assert the
    /// drain task never overlaps two of them.
    struct TracingSpeaker {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Speaker for TracingSpeaker {
        fn speak(&self, text: String) -> SpeakFuture {
            let events = Arc::clone(&self.events);
            Box::pin(async move {
                events.lock().unwrap().push(format!("begin {text}"));
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                events.lock().unwrap().push(format!("end {text}"));
                Ok(())
            })
        }
    }

    /// Fails every utterance but counts the attempts.
    struct FailingSpeaker {
        attempts: Arc<Mutex<usize>>,
    }

    impl Speaker for FailingSpeaker {
        fn speak(&self, _text: String) -> SpeakFuture {
            let attempts = Arc::clone(&self.attempts);
            Box::pin(async move {
                *attempts.lock().unwrap() += 1;
                Err(SpeakError::Engine("voice missing".into()))
            })
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_utterances_never_overlap() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let announcer = Announcer::new(Some(Arc::new(TracingSpeaker {
            events: Arc::clone(&events),
        })));

        announcer.enqueue("A");
        announcer.enqueue("B");
        wait_for(|| events.lock().unwrap().len() == 4).await;

        let log = events.lock().unwrap().clone();
        assert_eq!(log, vec!["begin A", "end A", "begin B", "end B"]);
    }

    #[tokio::test]
    async fn test_engine_failure_does_not_stall_queue() {
        let attempts = Arc::new(Mutex::new(0));
        let announcer = Announcer::new(Some(Arc::new(FailingSpeaker {
            attempts: Arc::clone(&attempts),
        })));

        announcer.enqueue("first");
        announcer.enqueue("second");
        announcer.enqueue("third");
        // Every failure resolves and the drain task keeps going.
        wait_for(|| *attempts.lock().unwrap() == 3).await;
    }

    #[tokio::test]
    async fn test_enqueue_without_speaker_is_noop() {
        let announcer = Announcer::new(None);
        announcer.enqueue("ignored");
    }

    #[tokio::test]
    async fn test_reset_abandons_pending_items() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut announcer = Announcer::new(Some(Arc::new(TracingSpeaker {
            events: Arc::clone(&events),
        })));

        announcer.enqueue("A");
        wait_for(|| !events.lock().unwrap().is_empty()).await;
        announcer.enqueue("stale");
        announcer.reset();
        announcer.enqueue("fresh");
        wait_for(|| {
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e == "end fresh")
        })
        .await;

        let log = events.lock().unwrap().clone();
        assert!(!log.iter().any(|e| e.contains("stale")), "{log:?}");
    }

    #[test]
    fn test_latch_fires_once() {
        let mut latches = EventLatches::default();
        assert!(latches.parachute_flag());
        for _ in 0..50 {
            assert!(!latches.parachute_flag());
        }
    }

    #[test]
    fn test_latches_are_independent() {
        let mut latches = EventLatches::default();
        assert!(latches.parachute_flag());
        assert!(latches.max_altitude());
        assert!(latches.apogee_text());
        assert!(!latches.parachute_flag());
    }

    #[test]
    fn test_reset_rearms_latches() {
        let mut latches = EventLatches::default();
        assert!(latches.servo_text());
        latches.reset();
        assert!(latches.servo_text());
    }
}
