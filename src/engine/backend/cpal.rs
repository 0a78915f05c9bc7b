//! CPAL-based audio sink for desktop platforms (Linux, macOS, Windows)
//!
//! Thin adapter between the scheduler's [`AudioSink`] trait and the
//! [`AudioEngine`] output stream: sessions are pushed onto the lock-free submit
//! queue and finished ones are dropped here, on the scheduler thread.

use crate::audio::engine_cpal::AudioEngine;
use crate::audio::sample::SampleFormat;
use crate::audio::session::PlaybackSession;
use crate::audio::session_queue::{SchedulerChannels, SessionQueue};
use crate::config::AudioConfig;
use crate::error::AudioError;

use super::AudioSink;

/// Audio sink playing through the default CPAL output device.
pub struct CpalSink {
    engine: AudioEngine,
    channels: SchedulerChannels,
}

impl CpalSink {
    /// Open the default output device for clips of `format`.
    pub fn open(format: SampleFormat, config: &AudioConfig) -> Result<Self, AudioError> {
        let (channels, audio_channels) =
            SessionQueue::new(config.session_queue_capacity).split_for_threads();
        let engine = AudioEngine::start(format, config, audio_channels)?;
        Ok(Self { engine, channels })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.engine.frames_rendered()
    }
}

impl AudioSink for CpalSink {
    fn format(&self) -> SampleFormat {
        self.engine.format()
    }

    fn submit(&mut self, session: PlaybackSession) -> Result<(), AudioError> {
        self.channels.drain_retired();

        let beat = session.beat_index;
        self.channels
            .submit_producer
            .push(session)
            .map_err(|_| AudioError::SubmitFailed {
                beat,
                reason: "session queue full".to_string(),
            })
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        tracing::info!(
            "[CpalSink] Closing output after {} rendered frames",
            self.frames_rendered()
        );
    }
}
