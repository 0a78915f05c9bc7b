//! Headless sink that simulates playback timing without an audio device.
//!
//! A worker thread stands in for the device callback: it pulls sessions off the
//! same lock-free queue the CPAL sink uses, waits for each clip's duration
//! (measured from the beat start) and fires the completion marker. Used by
//! `--dry-run` and by tests that need real-time behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::sample::SampleFormat;
use crate::audio::session::PlaybackSession;
use crate::audio::session_queue::{AudioThreadChannels, SchedulerChannels, SessionQueue};
use crate::error::AudioError;

use super::AudioSink;

const IDLE_POLL: Duration = Duration::from_millis(1);

pub struct SilentSink {
    format: SampleFormat,
    channels: SchedulerChannels,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SilentSink {
    pub fn new(format: SampleFormat, queue_capacity: usize) -> Result<Self, AudioError> {
        let (channels, audio_channels) = SessionQueue::new(queue_capacity).split_for_threads();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_shutdown = Arc::clone(&shutdown);
        let worker = std::thread::Builder::new()
            .name("silent-sink".to_string())
            .spawn(move || playback_loop(audio_channels, worker_shutdown))?;

        Ok(Self {
            format,
            channels,
            shutdown,
            worker: Some(worker),
        })
    }
}

fn playback_loop(mut channels: AudioThreadChannels, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Acquire) {
        let session = match channels.submit_consumer.pop() {
            Ok(session) => session,
            Err(_) => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
        };

        let finish = session.completion.t0() + session.clip.duration();
        while !shutdown.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= finish {
                break;
            }
            std::thread::sleep((finish - now).min(IDLE_POLL * 10));
        }

        tracing::trace!(
            "[SilentSink] Beat {} finished ({} frames)",
            session.beat_index,
            session.clip.frames()
        );
        session.completion.fire();
        let _ = channels.retire_producer.push(session);
    }
}

impl AudioSink for SilentSink {
    fn format(&self) -> SampleFormat {
        self.format
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

impl Drop for SilentSink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
