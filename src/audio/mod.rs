// Audio module - click samples, playback sessions and CPAL output

pub mod assets;
pub mod callback;
pub mod engine_cpal;
pub mod metronome;
pub mod sample;
pub mod session;
pub mod session_queue;

// Re-export commonly used types for convenience
pub use engine_cpal::AudioEngine;
pub use metronome::{BeatTiming, Tempo, DEFAULT_BPM, DEFAULT_SAFETY_FACTOR};
pub use sample::{ClickSample, ClickStream, Clip, SampleFormat, SampleVariant};
pub use session::{CompletionMarker, PlaybackSession};
pub use session_queue::{SessionQueue, SessionQueueChannels, DEFAULT_QUEUE_CAPACITY};
