//! Engine module housing the beat loop.
//!
//! `scheduler` owns the per-beat algorithm; `backend` holds the sink and
//! clock traits it runs against; `accent` and `cancel` are the small pieces
//! of state it consults every beat.

pub mod accent;
pub mod backend;
pub mod cancel;
pub mod scheduler;

pub use accent::AccentPattern;
pub use backend::{
    AudioSink, CpalSink, RecordingSink, SilentSink, StubTimeSource, SystemTimeSource, TimeSource,
};
pub use cancel::{spawn_signal_listener, CancellationToken};
pub use scheduler::{BeatOutcome, BeatScheduler, ClickBank, RunSummary, SchedulerConfig, SchedulerState};
