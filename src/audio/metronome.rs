//! Metronome timing arithmetic
//!
//! This module turns a tempo into the two durations the beat loop works with:
//! - Beat Interval: nominal onset-to-onset spacing, `60s / bpm`
//! - Short Interval: the truncated playback window per beat, a fixed fraction
//!   of the Beat Interval so playback ends before the next onset
//!
//! All durations use whole-nanosecond integer arithmetic. Every tempo that
//! divides 60 000 ms evenly (60, 120, 240, ...) yields an exact interval.

use std::time::Duration;

use crate::error::AudioError;

/// Default tempo in beats per minute
pub const DEFAULT_BPM: u32 = 120;

/// Default fraction of the Beat Interval that a click may play for
pub const DEFAULT_SAFETY_FACTOR: f64 = 0.9;

const NANOS_PER_MINUTE: u64 = 60_000_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// A validated tempo in beats per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tempo(u32);

impl Tempo {
    /// Validate a raw BPM value. Zero would produce a division by zero.
    pub fn new(bpm: u32) -> Result<Self, AudioError> {
        if bpm == 0 {
            return Err(AudioError::BpmInvalid { bpm });
        }
        Ok(Tempo(bpm))
    }

    #[inline]
    pub fn bpm(self) -> u32 {
        self.0
    }

    /// Nominal duration between consecutive beat onsets.
    ///
    /// # Examples
    /// ```
    /// use metronome::audio::metronome::Tempo;
    /// use std::time::Duration;
    ///
    /// let tempo = Tempo::new(120).unwrap();
    /// assert_eq!(tempo.beat_interval(), Duration::from_millis(500));
    /// ```
    #[inline]
    pub fn beat_interval(self) -> Duration {
        Duration::from_nanos(NANOS_PER_MINUTE / self.0 as u64)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo(DEFAULT_BPM)
    }
}

/// Per-run timing derived once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatTiming {
    pub tempo: Tempo,
    pub interval: Duration,
    pub short_interval: Duration,
}

impl BeatTiming {
    pub fn new(tempo: Tempo, safety_factor: f64) -> Result<Self, AudioError> {
        validate_safety_factor(safety_factor)?;
        let interval = tempo.beat_interval();
        Ok(Self {
            tempo,
            interval,
            short_interval: short_interval(interval, safety_factor),
        })
    }

    /// Number of frames of click audio each beat plays at `sample_rate`.
    #[inline]
    pub fn clip_frames(&self, sample_rate: u32) -> usize {
        frames_for(self.short_interval, sample_rate)
    }
}

/// Reject safety factors outside the open interval (0, 1).
pub fn validate_safety_factor(factor: f64) -> Result<(), AudioError> {
    if !(factor > 0.0 && factor < 1.0) {
        return Err(AudioError::ConfigInvalid {
            field: "safety_factor".to_string(),
            reason: format!("must be in (0, 1), got {}", factor),
        });
    }
    Ok(())
}

/// Scales `interval` by `factor`, keeping the result strictly below `interval`.
pub fn short_interval(interval: Duration, factor: f64) -> Duration {
    let nanos = interval.as_nanos() as u64;
    let scaled = (nanos as f64 * factor).round() as u64;
    Duration::from_nanos(scaled.min(nanos.saturating_sub(1)))
}

/// Number of whole frames that fit into `duration` at `sample_rate` (floored).
///
/// # Examples
/// ```
/// use metronome::audio::metronome::frames_for;
/// use std::time::Duration;
///
/// assert_eq!(frames_for(Duration::from_millis(450), 44_100), 19_845);
/// ```
#[inline]
pub fn frames_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_nanos() * sample_rate as u128 / NANOS_PER_SECOND) as usize
}

/// Duration of `frames` frames at `sample_rate`.
#[inline]
pub fn duration_of(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((frames as u128 * NANOS_PER_SECOND / sample_rate as u128) as u64)
}
