//! Backend abstractions for the beat scheduler.
//!
//! The scheduler talks to two collaborators through traits: an [`AudioSink`]
//! that plays bounded clips asynchronously, and a [`TimeSource`] that provides
//! the clock and the suspension primitives. Real runs use the CPAL sink and
//! the system clock; tests substitute a recording sink and a virtual clock.

use std::time::{Duration, Instant};

use crate::audio::sample::SampleFormat;
use crate::audio::session::PlaybackSession;
use crate::error::AudioError;

/// Output abstraction that plays playback sessions concurrently.
///
/// `submit` must not block beyond enqueueing: playback happens on the sink's
/// own thread or device callback, which fires the session's completion marker
/// when the clip has finished.
pub trait AudioSink {
    /// Format the sink was initialized for.
    fn format(&self) -> SampleFormat;

    /// Hand a session over for playback.
    fn submit(&mut self, session: PlaybackSession) -> Result<(), AudioError>;
}

/// Trait representing the clock and suspension primitives the scheduler uses.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;

    /// Suspend the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Suspend for at most `duration`, returning early if the thread is
    /// unparked (e.g. by a firing completion marker).
    fn park_timeout(&self, duration: Duration) {
        std::thread::park_timeout(duration);
    }
}

/// Default time source backed by `Instant::now` and `thread::sleep`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

mod cpal;
pub use cpal::CpalSink;

mod silent;
pub use silent::SilentSink;

mod desktop_stub;
pub use desktop_stub::{RecordingSink, SinkLog, StubTimeSource, SubmittedClip};
