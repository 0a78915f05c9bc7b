//! Configuration management
//!
//! Runtime configuration can be loaded from a JSON file; every field has a
//! default, so partial files are fine. A file that is missing or malformed is
//! an error. Command-line flags override whatever the file sets.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::callback::DEFAULT_MAX_VOICES;
use crate::audio::metronome::{validate_safety_factor, Tempo, DEFAULT_BPM, DEFAULT_SAFETY_FACTOR};
use crate::audio::session_queue::DEFAULT_QUEUE_CAPACITY;
use crate::engine::accent::DEFAULT_BEATS_PER_BAR;
use crate::error::AudioError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub metronome: MetronomeConfig,
    pub audio: AudioConfig,
}

/// How the scheduler obtains the playback duration of the current beat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Read the completion marker without waiting; zero if it has not fired.
    #[default]
    Optimistic,
    /// Wait for the completion marker, bounded by the end of the beat.
    Await,
}

/// Beat loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    /// Tempo in beats per minute
    pub bpm: u32,
    /// Accent the first beat of every bar
    pub accent: bool,
    /// Number of beats per bar (accent period)
    pub beats_per_bar: u32,
    /// Fraction of the beat interval a click may play for
    pub safety_factor: f64,
    pub completion_mode: CompletionMode,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            accent: false,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            completion_mode: CompletionMode::Optimistic,
        }
    }
}

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Device buffer length in milliseconds
    pub device_buffer_ms: u32,
    /// Sessions that may wait in the submit queue
    pub session_queue_capacity: usize,
    /// Clips the renderer mixes at the same time
    pub max_voices: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_buffer_ms: 1,
            session_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_voices: DEFAULT_MAX_VOICES,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Sections and fields the file leaves out keep their defaults.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` if the file cannot be read or is not valid JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            invalid("config", &format!("failed to read {}: {}", path.display(), err))
        })?;
        let config = serde_json::from_str(&contents).map_err(|err| {
            invalid("config", &format!("failed to parse {}: {}", path.display(), err))
        })?;
        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Reject values the beat loop cannot run with.
    pub fn validate(&self) -> Result<(), AudioError> {
        Tempo::new(self.metronome.bpm)?;
        validate_safety_factor(self.metronome.safety_factor)?;

        if self.metronome.beats_per_bar == 0 {
            return Err(invalid("beats_per_bar", "must be at least 1"));
        }
        if self.audio.device_buffer_ms == 0 {
            return Err(invalid("device_buffer_ms", "must be at least 1"));
        }
        if self.audio.session_queue_capacity == 0 {
            return Err(invalid("session_queue_capacity", "must be at least 1"));
        }
        if self.audio.max_voices == 0 {
            return Err(invalid("max_voices", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> AudioError {
    AudioError::ConfigInvalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.metronome.bpm, 120);
        assert!(!config.metronome.accent);
        assert_eq!(config.metronome.safety_factor, 0.9);
        assert_eq!(config.metronome.completion_mode, CompletionMode::Optimistic);
        assert_eq!(config.audio.device_buffer_ms, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "metronome": { "bpm": 90, "completion_mode": "await" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.metronome.bpm, 90);
        assert_eq!(config.metronome.completion_mode, CompletionMode::Await);
        assert_eq!(config.metronome.beats_per_bar, 4);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_bpm() {
        let mut config = AppConfig::default();
        config.metronome.bpm = 0;
        assert_eq!(config.validate(), Err(AudioError::BpmInvalid { bpm: 0 }));
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = AppConfig::default();
        config.metronome.safety_factor = 1.0;
        assert!(matches!(
            config.validate(),
            Err(AudioError::ConfigInvalid { .. })
        ));

        let mut config = AppConfig::default();
        config.audio.session_queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(AudioError::ConfigInvalid { ref field, .. }) if field == "session_queue_capacity"
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("metronome-no-such-config.json");
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(AudioError::ConfigInvalid { ref field, .. }) if field == "config"
        ));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = std::env::temp_dir()
            .join(format!("metronome-invalid-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let result = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(AudioError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir()
            .join(format!("metronome-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "metronome": { "bpm": 75, "accent": true } }"#).unwrap();
        let result = AppConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);

        let config = result.unwrap();
        assert_eq!(config.metronome.bpm, 75);
        assert!(config.metronome.accent);
        assert_eq!(config.audio, AudioConfig::default());
    }
}
