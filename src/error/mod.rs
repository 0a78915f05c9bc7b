// Error types for the metronome
//
// Errors fall into two classes: fatal errors abort startup (or the run),
// transient errors cost a single beat's audio and leave the timing loop alive.

mod audio;

pub use audio::{log_audio_error, AudioError};

/// Severity class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Abort before (or instead of) continuing the beat loop.
    Fatal,
    /// Skip the affected beat's audio, keep the timing grid.
    Transient,
}

/// Standard way to classify and describe the crate's error types.
pub trait Classify {
    /// Severity class of the error
    fn class(&self) -> ErrorClass;

    /// Get the human-readable error message
    fn message(&self) -> String;

    fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}
