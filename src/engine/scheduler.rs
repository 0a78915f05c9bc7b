//! BeatScheduler: the drift-compensated beat loop.
//!
//! Every beat the scheduler rewinds the selected click, hands a clip of
//! Short Interval length to the sink together with a completion marker, and
//! then sleeps for whatever is left of the Beat Interval. The loop has two
//! states, RUNNING and STOPPED; the only way to STOPPED is the cancellation
//! check at the top of a beat (or a fatal error).
//!
//! Shutdown latency is bounded by one Beat Interval: cancellation is observed
//! at the next beat boundary, never mid-sleep.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::metronome::{BeatTiming, Tempo};
use crate::audio::sample::{ClickSample, ClickStream, SampleFormat, SampleVariant};
use crate::audio::session::PlaybackSession;
use crate::config::{CompletionMode, MetronomeConfig};
use crate::error::{log_audio_error, AudioError, Classify};

use super::accent::AccentPattern;
use super::backend::{AudioSink, TimeSource};
use super::cancel::CancellationToken;

/// Validated scheduler parameters, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub timing: BeatTiming,
    pub accent: AccentPattern,
    pub completion_mode: CompletionMode,
}

impl SchedulerConfig {
    pub fn from_config(config: &MetronomeConfig) -> Result<Self, AudioError> {
        if config.beats_per_bar == 0 {
            return Err(AudioError::ConfigInvalid {
                field: "beats_per_bar".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            timing: BeatTiming::new(Tempo::new(config.bpm)?, config.safety_factor)?,
            accent: AccentPattern::new(config.accent, config.beats_per_bar),
            completion_mode: config.completion_mode,
        })
    }
}

/// One click stream per sample variant, all in the same format.
pub struct ClickBank {
    normal: ClickStream,
    accent: ClickStream,
}

impl ClickBank {
    pub fn new(normal: &ClickSample, accent: &ClickSample) -> Result<Self, AudioError> {
        if normal.format() != accent.format() {
            return Err(AudioError::ConfigInvalid {
                field: "accent click".to_string(),
                reason: format!(
                    "format {:?} differs from regular click {:?}",
                    accent.format(),
                    normal.format()
                ),
            });
        }
        Ok(Self {
            normal: normal.stream(),
            accent: accent.stream(),
        })
    }

    /// Use the same click for every beat.
    pub fn single(sample: &ClickSample) -> Self {
        Self {
            normal: sample.stream(),
            accent: sample.stream(),
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.normal.format()
    }

    fn stream_mut(&mut self, variant: SampleVariant) -> &mut ClickStream {
        match variant {
            SampleVariant::Normal => &mut self.normal,
            SampleVariant::Accent => &mut self.accent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// What happened on a single beat.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatOutcome {
    pub beat_index: u64,
    pub variant: SampleVariant,
    /// Whether the session reached the sink
    pub dispatched: bool,
    /// Playback duration measured by the completion marker, if it had fired
    pub playback: Option<Duration>,
    /// Residual sleep at the end of the beat
    pub slept: Duration,
    /// Dispatch and bookkeeping ran past the Beat Interval
    pub overrun: bool,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub beats: u64,
    pub skipped: u64,
    pub overruns: u64,
    pub elapsed: Duration,
}

pub struct BeatScheduler {
    config: SchedulerConfig,
    clicks: ClickBank,
    clip_frames: usize,
    sink: Box<dyn AudioSink>,
    clock: Arc<dyn TimeSource>,
    cancel: CancellationToken,
    state: SchedulerState,
    beat_index: u64,
    summary: RunSummary,
}

impl BeatScheduler {
    /// # Errors
    /// Returns `ConfigInvalid` if the sink was initialized for a different
    /// format than the click samples.
    pub fn new(
        config: SchedulerConfig,
        clicks: ClickBank,
        sink: Box<dyn AudioSink>,
        clock: Arc<dyn TimeSource>,
        cancel: CancellationToken,
    ) -> Result<Self, AudioError> {
        let format = clicks.format();
        if sink.format() != format {
            return Err(AudioError::ConfigInvalid {
                field: "sample_format".to_string(),
                reason: format!(
                    "sink expects {:?} but clicks are {:?}",
                    sink.format(),
                    format
                ),
            });
        }

        Ok(Self {
            clip_frames: config.timing.clip_frames(format.sample_rate),
            config,
            clicks,
            sink,
            clock,
            cancel,
            state: SchedulerState::Running,
            beat_index: 0,
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Frames each beat's clip is truncated to.
    pub fn clip_frames(&self) -> usize {
        self.clip_frames
    }

    /// Run beats until cancellation.
    ///
    /// # Errors
    /// Only fatal errors (a failing rewind, a fatal sink error) end the run
    /// early; transient submission failures are logged and counted.
    pub fn run(&mut self) -> Result<RunSummary, AudioError> {
        let timing = self.config.timing;
        tracing::info!(
            "[BeatScheduler] Starting: bpm={}, interval={:?}, playback window={:?} ({} frames), mode={:?}, accent={}",
            timing.tempo.bpm(),
            timing.interval,
            timing.short_interval,
            self.clip_frames,
            self.config.completion_mode,
            self.config.accent.enabled
        );

        let started = self.clock.now();
        while self.step()?.is_some() {}
        self.summary.elapsed = self.clock.now().saturating_duration_since(started);

        tracing::info!(
            "[BeatScheduler] Stopped after {} beats in {:?} (skipped={}, overruns={})",
            self.summary.beats,
            self.summary.elapsed,
            self.summary.skipped,
            self.summary.overruns
        );
        Ok(self.summary)
    }

    /// Play one beat. Returns `None` once the scheduler has stopped.
    pub fn step(&mut self) -> Result<Option<BeatOutcome>, AudioError> {
        if self.state == SchedulerState::Stopped {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            tracing::debug!("[BeatScheduler] Cancellation observed before beat {}", self.beat_index);
            self.state = SchedulerState::Stopped;
            return Ok(None);
        }

        let beat_index = self.beat_index;
        let interval = self.config.timing.interval;
        let t0 = self.clock.now();

        let variant = self.config.accent.select(beat_index);
        let stream = self.clicks.stream_mut(variant);
        if let Err(err) = stream.rewind() {
            log_audio_error(&err, "rewind");
            self.state = SchedulerState::Stopped;
            return Err(err);
        }
        let clip = stream.take(self.clip_frames);

        let session = PlaybackSession::new(beat_index, variant, clip, t0);
        let marker = session.completion.clone();

        let dispatched = match self.sink.submit(session) {
            Ok(()) => true,
            Err(err) if err.is_fatal() => {
                log_audio_error(&err, "submit");
                self.state = SchedulerState::Stopped;
                return Err(err);
            }
            Err(err) => {
                log_audio_error(&err, "submit");
                self.summary.skipped += 1;
                false
            }
        };

        let (playback, remaining) = match self.config.completion_mode {
            CompletionMode::Optimistic => {
                // Best-effort read; the clip has usually not finished yet.
                let dur = marker.elapsed_or_zero();
                (marker.elapsed(), interval.checked_sub(dur))
            }
            CompletionMode::Await => {
                let playback = if dispatched {
                    marker.wait_until(self.clock.as_ref(), t0 + interval)
                } else {
                    None
                };
                let spent = self.clock.now().saturating_duration_since(t0);
                (playback, interval.checked_sub(spent))
            }
        };

        let overrun = remaining.is_none();
        if overrun {
            self.summary.overruns += 1;
            tracing::debug!("[BeatScheduler] Beat {} overran its interval", beat_index);
        }
        let slept = remaining.unwrap_or(Duration::ZERO);
        self.clock.sleep(slept);

        self.beat_index += 1;
        self.summary.beats += 1;

        tracing::trace!(
            "[BeatScheduler] Beat {} ({:?}): dispatched={}, playback={:?}, slept={:?}",
            beat_index,
            variant,
            dispatched,
            playback,
            slept
        );

        Ok(Some(BeatOutcome {
            beat_index,
            variant,
            dispatched,
            playback,
            slept,
            overrun,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{RecordingSink, SinkLog, StubTimeSource};

    const FORMAT: SampleFormat = SampleFormat {
        sample_rate: 1000,
        channels: 1,
    };

    fn click(value: f32) -> ClickSample {
        ClickSample::new(vec![value; 2000], FORMAT).unwrap()
    }

    fn scheduler(
        metronome: MetronomeConfig,
        sink_failures: &[u64],
    ) -> (BeatScheduler, Arc<StubTimeSource>, SinkLog, CancellationToken) {
        let clock = Arc::new(StubTimeSource::new());
        let sink = RecordingSink::new(FORMAT, Arc::clone(&clock))
            .failing_on(sink_failures.iter().copied());
        let log = sink.log();
        let cancel = CancellationToken::new();
        let scheduler = BeatScheduler::new(
            SchedulerConfig::from_config(&metronome).unwrap(),
            ClickBank::new(&click(0.25), &click(0.75)).unwrap(),
            Box::new(sink),
            clock.clone(),
            cancel.clone(),
        )
        .unwrap();
        (scheduler, clock, log, cancel)
    }

    #[test]
    fn test_cancelled_before_first_beat() {
        let (mut scheduler, clock, log, cancel) = scheduler(MetronomeConfig::default(), &[]);
        cancel.cancel();

        let summary = scheduler.run().unwrap();
        assert_eq!(summary.beats, 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(log.is_empty());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_optimistic_beat_sleeps_full_interval() {
        let (mut scheduler, clock, _log, _cancel) = scheduler(MetronomeConfig::default(), &[]);

        let outcome = scheduler.step().unwrap().unwrap();
        assert!(outcome.dispatched);
        assert_eq!(outcome.playback, None);
        assert_eq!(outcome.slept, Duration::from_millis(500));
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn test_await_mode_measures_playback() {
        let config = MetronomeConfig {
            completion_mode: CompletionMode::Await,
            ..MetronomeConfig::default()
        };
        let (mut scheduler, clock, _log, _cancel) = scheduler(config, &[]);

        let outcome = scheduler.step().unwrap().unwrap();
        assert_eq!(outcome.playback, Some(Duration::from_millis(450)));
        assert_eq!(outcome.slept, Duration::from_millis(50));
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn test_accent_alternates_clicks() {
        let config = MetronomeConfig {
            accent: true,
            beats_per_bar: 3,
            ..MetronomeConfig::default()
        };
        let (mut scheduler, _clock, log, _cancel) = scheduler(config, &[]);
        for _ in 0..6 {
            scheduler.step().unwrap();
        }

        let firsts: Vec<_> = log.entries().iter().map(|e| e.first_sample).collect();
        assert_eq!(
            firsts,
            vec![
                Some(0.75),
                Some(0.25),
                Some(0.25),
                Some(0.75),
                Some(0.25),
                Some(0.25)
            ]
        );
    }

    #[test]
    fn test_submit_failure_skips_audio_keeps_grid() {
        let (mut scheduler, clock, log, _cancel) = scheduler(MetronomeConfig::default(), &[1]);
        for _ in 0..3 {
            scheduler.step().unwrap();
        }

        let beats: Vec<_> = log.entries().iter().map(|e| e.beat_index).collect();
        assert_eq!(beats, vec![0, 2]);
        assert_eq!(log.entries()[1].started_at, Duration::from_millis(1000));
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
        assert_eq!(scheduler.summary.skipped, 1);
    }

    #[test]
    fn test_mismatched_sink_format_rejected() {
        let clock = Arc::new(StubTimeSource::new());
        let sink = RecordingSink::new(
            SampleFormat {
                sample_rate: 48_000,
                channels: 2,
            },
            clock.clone(),
        );
        let result = BeatScheduler::new(
            SchedulerConfig::from_config(&MetronomeConfig::default()).unwrap(),
            ClickBank::single(&click(0.5)),
            Box::new(sink),
            clock,
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(AudioError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_mismatched_accent_format_rejected() {
        let other = ClickSample::new(
            vec![0.0; 10],
            SampleFormat {
                sample_rate: 44_100,
                channels: 1,
            },
        )
        .unwrap();
        assert!(ClickBank::new(&click(0.5), &other).is_err());
    }

    #[test]
    fn test_stopped_scheduler_stays_stopped() {
        let (mut scheduler, _clock, _log, cancel) = scheduler(MetronomeConfig::default(), &[]);
        scheduler.step().unwrap();
        cancel.cancel();
        assert_eq!(scheduler.step().unwrap(), None);
        assert_eq!(scheduler.step().unwrap(), None);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
