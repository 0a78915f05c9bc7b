//! Click samples, seekable click streams and bounded clips
//!
//! A [`ClickSample`] is decoded once at startup and never mutated. The beat
//! scheduler owns one [`ClickStream`] per sample variant; rewinding a stream
//! moves its read position only, and the [`Clip`]s it hands out are independent
//! `Arc` views, so a clip still being played is never affected by the next
//! beat's rewind.

use std::sync::Arc;
use std::time::Duration;

use super::metronome::duration_of;
use crate::error::AudioError;

/// Sample format descriptor of a decoded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

/// Which click a beat plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleVariant {
    Normal,
    Accent,
}

/// Immutable decoded audio (interleaved f32 in [-1.0, 1.0]).
#[derive(Debug, Clone)]
pub struct ClickSample {
    samples: Arc<[f32]>,
    format: SampleFormat,
}

impl ClickSample {
    /// Wrap interleaved samples. Trailing samples that do not form a whole
    /// frame are dropped.
    pub fn new(mut samples: Vec<f32>, format: SampleFormat) -> Result<Self, AudioError> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(AudioError::DecodeFailed {
                name: "click".to_string(),
                reason: format!(
                    "degenerate format ({} Hz, {} channels)",
                    format.sample_rate, format.channels
                ),
            });
        }
        let channels = format.channels as usize;
        samples.truncate(samples.len() - samples.len() % channels);
        Ok(Self {
            samples: samples.into(),
            format,
        })
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    pub fn duration(&self) -> Duration {
        duration_of(self.frames(), self.format.sample_rate)
    }

    /// Open a read handle positioned at frame 0.
    pub fn stream(&self) -> ClickStream {
        ClickStream {
            sample: self.clone(),
            position: 0,
        }
    }
}

/// Seekable read handle over a [`ClickSample`].
#[derive(Debug)]
pub struct ClickStream {
    sample: ClickSample,
    position: usize,
}

impl ClickStream {
    pub fn format(&self) -> SampleFormat {
        self.sample.format
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn frames(&self) -> usize {
        self.sample.frames()
    }

    /// Move the read position to `frame`. Seeking past the end is an error.
    pub fn seek(&mut self, frame: usize) -> Result<(), AudioError> {
        if frame > self.sample.frames() {
            return Err(AudioError::SeekFailed {
                position: frame,
                frames: self.sample.frames(),
            });
        }
        self.position = frame;
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<(), AudioError> {
        self.seek(0)
    }

    /// Take up to `frames` frames from the current position and advance past
    /// them. The clip is shorter when the stream runs out first.
    pub fn take(&mut self, frames: usize) -> Clip {
        let available = self.sample.frames() - self.position;
        let len = frames.min(available);
        let clip = Clip {
            samples: Arc::clone(&self.sample.samples),
            format: self.sample.format,
            start_frame: self.position,
            frames: len,
        };
        self.position += len;
        clip
    }
}

/// A bounded, independent view into a click sample.
#[derive(Debug, Clone)]
pub struct Clip {
    samples: Arc<[f32]>,
    format: SampleFormat,
    start_frame: usize,
    frames: usize,
}

impl Clip {
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn duration(&self) -> Duration {
        duration_of(self.frames, self.format.sample_rate)
    }

    /// Interleaved samples covered by this clip.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        let channels = self.format.channels as usize;
        let start = self.start_frame * channels;
        &self.samples[start..start + self.frames * channels]
    }

    /// Sample of `frame` on output channel `channel`. Channels beyond the
    /// clip's own layout wrap around, so mono clips feed every output channel.
    #[inline]
    pub fn sample_at(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.format.channels as usize;
        self.samples[(self.start_frame + frame) * channels + channel % channels]
    }
}
