// Metronome Core - drift-compensated beat scheduling
// Bounded click playback over a lock-free session queue

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use config::{AppConfig, AudioConfig, CompletionMode, MetronomeConfig};
pub use engine::{BeatScheduler, CancellationToken, RunSummary};
pub use error::AudioError;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. "info", "debug") is used.
/// Calling this more than once is harmless.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
