//! AudioEngine - CPAL output stream driving the session renderer
//!
//! Opens the default output device at the click sample's rate with a small
//! fixed buffer (1ms worth of frames by default) and runs an
//! [`OutputCallback`] inside the device callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::callback::OutputCallback;
use super::sample::SampleFormat;
use super::session_queue::AudioThreadChannels;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Number of frames in `buffer_ms` milliseconds at `sample_rate` (at least one).
#[inline]
pub fn buffer_frames(sample_rate: u32, buffer_ms: u32) -> u32 {
    ((sample_rate as u64 * buffer_ms as u64) / 1000).max(1) as u32
}

pub struct AudioEngine {
    /// Output audio stream
    output_stream: Option<cpal::Stream>,
    /// Format of the clips the engine plays
    format: SampleFormat,
    /// Frames written by the callback so far
    frames_rendered: Arc<AtomicU64>,
}

impl AudioEngine {
    /// Open and start the default output device for `format`.
    ///
    /// # Errors
    /// Returns `StreamOpenFailed` if no device exists, the device does not
    /// produce F32 samples, or it rejects the click's sample rate, and
    /// `HardwareError` if the stream cannot be started.
    pub fn start(
        format: SampleFormat,
        config: &AudioConfig,
        channels: AudioThreadChannels,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default output device found".to_string(),
            })?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default output config: {:?}", e),
            })?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::StreamOpenFailed {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            });
        }

        let requested = buffer_frames(format.sample_rate, config.device_buffer_ms);
        let fixed = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => requested.clamp(*min, *max),
            cpal::SupportedBufferSize::Unknown => requested,
        };

        let device_channels = supported.channels();
        let mut stream_config = cpal::StreamConfig {
            channels: device_channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(fixed),
        };

        let callback = OutputCallback::new(channels, device_channels as usize, config.max_voices);
        let frames_rendered = callback.frames_rendered_ref();

        // The callback moves into whichever stream gets built, so it is parked
        // in a shared slot until then.
        let slot = Arc::new(std::sync::Mutex::new(Some(callback)));

        let stream = match Self::build_stream(&device, &stream_config, Arc::clone(&slot)) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(
                    "[AudioEngine] Fixed buffer of {} frames rejected ({}), using device default",
                    fixed,
                    err
                );
                stream_config.buffer_size = cpal::BufferSize::Default;
                Self::build_stream(&device, &stream_config, slot)?
            }
        };

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Output start failed: {}", e),
        })?;

        tracing::info!(
            "[AudioEngine] Output started: device={:?}, rate={} Hz, channels={}, buffer={:?}",
            device.name().unwrap_or_else(|_| "<unknown>".to_string()),
            format.sample_rate,
            device_channels,
            stream_config.buffer_size
        );

        Ok(Self {
            output_stream: Some(stream),
            format,
            frames_rendered,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        stream_config: &cpal::StreamConfig,
        slot: Arc<std::sync::Mutex<Option<OutputCallback>>>,
    ) -> Result<cpal::Stream, AudioError> {
        let mut callback: Option<OutputCallback> = None;
        let err_fn = |err| tracing::warn!("[AudioEngine] Output stream error: {}", err);

        device
            .build_output_stream(
                stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if callback.is_none() {
                        // First callback only: claim the renderer from the slot.
                        callback = slot.try_lock().ok().and_then(|mut guard| guard.take());
                    }
                    match callback.as_mut() {
                        Some(callback) => callback.render(data),
                        None => data.fill(0.0),
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("{:?}", e),
            })
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.output_stream.take() {
            drop(stream);
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_frames_is_one_millisecond() {
        assert_eq!(buffer_frames(44_100, 1), 44);
        assert_eq!(buffer_frames(48_000, 1), 48);
        assert_eq!(buffer_frames(96_000, 2), 192);
    }

    #[test]
    fn test_buffer_frames_never_zero() {
        assert_eq!(buffer_frames(500, 1), 1);
        assert_eq!(buffer_frames(44_100, 0), 1);
    }
}
