//! Playback sessions and their completion markers
//!
//! A [`PlaybackSession`] is one beat's unit of work: a bounded clip plus a
//! [`CompletionMarker`] that records how long after the beat started the clip
//! finished playing. Markers are fired from the audio thread, so firing is
//! lock-free: one atomic compare-exchange and an unpark of the waiting
//! scheduler thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use super::sample::{Clip, SampleVariant};
use crate::engine::backend::TimeSource;

const UNFIRED: u64 = u64::MAX;

struct MarkerState {
    t0: Instant,
    elapsed_nanos: AtomicU64,
    waiter: Thread,
}

/// One-shot record of when a session's clip finished playing.
///
/// Cloning shares the same state. The thread that creates the marker is the one
/// woken when it fires.
#[derive(Clone)]
pub struct CompletionMarker {
    state: Arc<MarkerState>,
}

impl CompletionMarker {
    pub fn new(t0: Instant) -> Self {
        Self {
            state: Arc::new(MarkerState {
                t0,
                elapsed_nanos: AtomicU64::new(UNFIRED),
                waiter: thread::current(),
            }),
        }
    }

    /// Beat start this marker measures from.
    pub fn t0(&self) -> Instant {
        self.state.t0
    }

    /// Record completion at `now`. Only the first call has any effect.
    ///
    /// Returns `true` if this call fired the marker.
    pub fn fire_at(&self, now: Instant) -> bool {
        let nanos = now.saturating_duration_since(self.state.t0).as_nanos();
        let nanos = nanos.min((UNFIRED - 1) as u128) as u64;
        let fired = self
            .state
            .elapsed_nanos
            .compare_exchange(UNFIRED, nanos, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if fired {
            self.state.waiter.unpark();
        }
        fired
    }

    pub fn fire(&self) -> bool {
        self.fire_at(Instant::now())
    }

    pub fn is_fired(&self) -> bool {
        self.state.elapsed_nanos.load(Ordering::Acquire) != UNFIRED
    }

    /// Elapsed time between beat start and clip completion, if fired.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.state.elapsed_nanos.load(Ordering::Acquire) {
            UNFIRED => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    /// Non-blocking best-effort read: zero while the clip is still playing.
    pub fn elapsed_or_zero(&self) -> Duration {
        self.elapsed().unwrap_or(Duration::ZERO)
    }

    /// Block until the marker fires or `deadline` passes, whichever comes first.
    ///
    /// Waiting goes through `clock` so virtual clocks can drive playback while
    /// the scheduler is parked.
    pub fn wait_until(&self, clock: &dyn TimeSource, deadline: Instant) -> Option<Duration> {
        loop {
            if let Some(elapsed) = self.elapsed() {
                return Some(elapsed);
            }
            let now = clock.now();
            if now >= deadline {
                return None;
            }
            clock.park_timeout(deadline - now);
        }
    }
}

impl std::fmt::Debug for CompletionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionMarker")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

/// One beat's bounded audio submission plus its completion marker.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub beat_index: u64,
    pub variant: SampleVariant,
    pub clip: Clip,
    pub completion: CompletionMarker,
}

impl PlaybackSession {
    pub fn new(beat_index: u64, variant: SampleVariant, clip: Clip, t0: Instant) -> Self {
        Self {
            beat_index,
            variant,
            clip,
            completion: CompletionMarker::new(t0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::SystemTimeSource;

    #[test]
    fn test_marker_starts_unfired() {
        let marker = CompletionMarker::new(Instant::now());
        assert!(!marker.is_fired());
        assert_eq!(marker.elapsed(), None);
        assert_eq!(marker.elapsed_or_zero(), Duration::ZERO);
    }

    #[test]
    fn test_marker_fires_once() {
        let t0 = Instant::now();
        let marker = CompletionMarker::new(t0);

        assert!(marker.fire_at(t0 + Duration::from_millis(450)));
        assert!(!marker.fire_at(t0 + Duration::from_millis(900)));
        assert_eq!(marker.elapsed(), Some(Duration::from_millis(450)));
    }

    #[test]
    fn test_marker_clones_share_state() {
        let t0 = Instant::now();
        let marker = CompletionMarker::new(t0);
        let audio_side = marker.clone();
        audio_side.fire_at(t0 + Duration::from_millis(3));
        assert_eq!(marker.elapsed(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_fire_before_t0_saturates() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let marker = CompletionMarker::new(t0);
        marker.fire_at(Instant::now());
        assert_eq!(marker.elapsed(), Some(Duration::ZERO));
    }

    #[test]
    fn test_wait_until_wakes_on_fire() {
        let clock = SystemTimeSource::default();
        let t0 = clock.now();
        let marker = CompletionMarker::new(t0);
        let remote = marker.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.fire();
        });

        let elapsed = marker.wait_until(&clock, t0 + Duration::from_secs(5));
        handle.join().unwrap();

        let elapsed = elapsed.expect("marker should fire before the deadline");
        assert!(elapsed >= Duration::from_millis(20));
        assert!(clock.now() - t0 < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_until_times_out() {
        let clock = SystemTimeSource::default();
        let t0 = clock.now();
        let marker = CompletionMarker::new(t0);

        let result = marker.wait_until(&clock, t0 + Duration::from_millis(15));
        assert_eq!(result, None);
        assert!(clock.now() - t0 >= Duration::from_millis(15));
    }
}
