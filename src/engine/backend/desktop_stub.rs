use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::audio::sample::{SampleFormat, SampleVariant};
use crate::audio::session::PlaybackSession;
use crate::error::AudioError;

use super::{AudioSink, TimeSource};

type Timer = Box<dyn FnOnce(Instant) + Send>;

#[derive(Default)]
struct VirtualClock {
    offset: Duration,
    /// Pending callbacks, sorted by due offset
    timers: Vec<(Duration, Timer)>,
}

/// Deterministic virtual clock for tests and tooling.
///
/// Time only advances when someone sleeps or parks. Callbacks registered with
/// [`StubTimeSource::schedule_at`] run, in order, as virtual time passes them,
/// which is how simulated playback completions and cancellations are injected.
pub struct StubTimeSource {
    origin: Instant,
    clock: Mutex<VirtualClock>,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            clock: Mutex::new(VirtualClock::default()),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().offset
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Run `callback` once virtual time reaches `at`. Callbacks due in the
    /// past run on the next advance.
    pub fn schedule_at<F>(&self, at: Instant, callback: F)
    where
        F: FnOnce(Instant) + Send + 'static,
    {
        let due = at.saturating_duration_since(self.origin);
        let mut clock = self.lock();
        let index = clock.timers.partition_point(|(existing, _)| *existing <= due);
        clock.timers.insert(index, (due, Box::new(callback)));
    }

    /// Advance virtual time to `target`, running every timer due on the way.
    fn advance_to(&self, target: Duration) {
        loop {
            let timer = {
                let mut clock = self.lock();
                match clock.timers.first() {
                    Some((due, _)) if *due <= target => {
                        let (due, callback) = clock.timers.remove(0);
                        clock.offset = clock.offset.max(due);
                        Some((clock.offset, callback))
                    }
                    _ => {
                        clock.offset = clock.offset.max(target);
                        None
                    }
                }
            };

            match timer {
                // Lock released: callbacks may schedule further timers
                Some((at, callback)) => callback(self.origin + at),
                None => return,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VirtualClock> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        self.origin + self.lock().offset
    }

    fn sleep(&self, duration: Duration) {
        let target = self.lock().offset + duration;
        self.advance_to(target);
    }

    /// Advances to the next timer or the timeout, whichever is earlier, so a
    /// marker fired by a timer ends the park early.
    fn park_timeout(&self, duration: Duration) {
        let target = {
            let clock = self.lock();
            let limit = clock.offset + duration;
            match clock.timers.first() {
                Some((due, _)) if *due < limit => (*due).max(clock.offset),
                _ => limit,
            }
        };
        self.advance_to(target);
    }
}

/// What a [`RecordingSink`] saw for one submitted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedClip {
    pub beat_index: u64,
    pub variant: SampleVariant,
    pub frames: usize,
    pub duration: Duration,
    /// Beat start, relative to the clock's origin
    pub started_at: Duration,
    /// First interleaved sample of the clip
    pub first_sample: Option<f32>,
}

/// Shared view of everything a [`RecordingSink`] accepted.
#[derive(Clone, Default)]
pub struct SinkLog {
    entries: Arc<Mutex<Vec<SubmittedClip>>>,
}

impl SinkLog {
    pub fn entries(&self) -> Vec<SubmittedClip> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, entry: SubmittedClip) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}

/// Sink that records submissions and completes them on a [`StubTimeSource`].
///
/// Each clip "finishes" once virtual time reaches beat start + clip duration,
/// exactly like a device that plays it back without latency.
pub struct RecordingSink {
    format: SampleFormat,
    clock: Arc<StubTimeSource>,
    log: SinkLog,
    failing_beats: HashSet<u64>,
}

impl RecordingSink {
    pub fn new(format: SampleFormat, clock: Arc<StubTimeSource>) -> Self {
        Self {
            format,
            clock,
            log: SinkLog::default(),
            failing_beats: HashSet::new(),
        }
    }

    /// Reject the submissions of the given beats with `SubmitFailed`.
    pub fn failing_on<I: IntoIterator<Item = u64>>(mut self, beats: I) -> Self {
        self.failing_beats.extend(beats);
        self
    }

    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }
}

impl AudioSink for RecordingSink {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn submit(&mut self, session: PlaybackSession) -> Result<(), AudioError> {
        if self.failing_beats.contains(&session.beat_index) {
            return Err(AudioError::SubmitFailed {
                beat: session.beat_index,
                reason: "injected failure".to_string(),
            });
        }

        let t0 = session.completion.t0();
        self.log.push(SubmittedClip {
            beat_index: session.beat_index,
            variant: session.variant,
            frames: session.clip.frames(),
            duration: session.clip.duration(),
            started_at: t0.saturating_duration_since(self.clock.origin()),
            first_sample: session.clip.samples().first().copied(),
        });

        let marker = session.completion.clone();
        self.clock
            .schedule_at(t0 + session.clip.duration(), move |now| {
                marker.fire_at(now);
            });
        Ok(())
    }
}
