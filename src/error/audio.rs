// Audio error types

use crate::error::{Classify, ErrorClass};
use log::{error, warn};
use std::fmt;

/// Log an audio error with structured context
///
/// Fatal errors are logged at error level, transient ones at warn level so a
/// skipped beat does not look like a crash in the log stream.
pub fn log_audio_error(err: &AudioError, context: &str) {
    match err.class() {
        ErrorClass::Fatal => error!(
            "Audio error in {}: class=fatal, component=BeatScheduler, message={}",
            context,
            err.message()
        ),
        ErrorClass::Transient => warn!(
            "Audio error in {}: class=transient, component=BeatScheduler, message={}",
            context,
            err.message()
        ),
    }
}

/// Audio-related errors
///
/// These errors cover startup validation, asset loading, device access and
/// per-beat dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// BPM value is invalid (must be > 0)
    BpmInvalid { bpm: u32 },

    /// A configuration value is out of range
    ConfigInvalid { field: String, reason: String },

    /// Named click asset does not exist
    AssetNotFound { name: String },

    /// Click asset could not be decoded
    DecodeFailed { name: String, reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Seeking the click stream failed
    SeekFailed { position: usize, frames: usize },

    /// A playback session could not be handed to the sink
    SubmitFailed { beat: u64, reason: String },
}

impl Classify for AudioError {
    fn class(&self) -> ErrorClass {
        match self {
            AudioError::SubmitFailed { .. } => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::BpmInvalid { bpm } => {
                format!("BPM must be greater than 0 (got {})", bpm)
            }
            AudioError::ConfigInvalid { field, reason } => {
                format!("Invalid configuration value for {}: {}", field, reason)
            }
            AudioError::AssetNotFound { name } => {
                format!("Click asset not found: {}", name)
            }
            AudioError::DecodeFailed { name, reason } => {
                format!("Failed to decode {}: {}", name, reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::SeekFailed { position, frames } => {
                format!(
                    "Cannot seek click stream to frame {} (stream has {} frames)",
                    position, frames
                )
            }
            AudioError::SubmitFailed { beat, reason } => {
                format!("Beat {} was not played: {}", beat, reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
