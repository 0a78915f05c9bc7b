//! Audio Output Callback - device-agnostic renderer for playback sessions
//!
//! [`OutputCallback`] owns the audio-thread ends of the session queue. On every
//! device callback it picks up newly submitted sessions, mixes all active clips
//! into the interleaved output buffer, and fires each session's completion
//! marker the moment its last frame has been written.
//!
//! # Real-Time Safety
//! - No heap allocations: the voice table is allocated up front
//! - No mutex locks: sessions arrive and leave on lock-free SPSC queues
//! - Finished sessions are handed back to the scheduler thread for dropping

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::session::PlaybackSession;
use super::session_queue::AudioThreadChannels;

/// Default number of clips that may sound at the same time
pub const DEFAULT_MAX_VOICES: usize = 8;

struct Voice {
    session: PlaybackSession,
    cursor: usize,
}

/// Output renderer shared by every device backend.
pub struct OutputCallback {
    channels: AudioThreadChannels,
    voices: Vec<Voice>,
    max_voices: usize,
    output_channels: usize,
    frames_rendered: Arc<AtomicU64>,
}

impl OutputCallback {
    /// # Arguments
    /// * `channels` - Audio-thread ends of the session queue
    /// * `output_channels` - Interleaved channel count of the device buffer
    /// * `max_voices` - Upper bound on simultaneously mixed clips
    pub fn new(channels: AudioThreadChannels, output_channels: usize, max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            channels,
            voices: Vec::with_capacity(max_voices),
            max_voices,
            output_channels: output_channels.max(1),
            frames_rendered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total frames written since creation.
    pub fn frames_rendered_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames_rendered)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fill `data` (interleaved, `output_channels` wide), timestamping
    /// completions with `Instant::now()`.
    pub fn render(&mut self, data: &mut [f32]) {
        self.render_at(data, Instant::now());
    }

    /// Fill `data`, timestamping completions with `now`.
    pub fn render_at(&mut self, data: &mut [f32], now: Instant) {
        self.accept_sessions(now);

        data.fill(0.0);
        let frame_count = data.len() / self.output_channels;

        let mut i = 0;
        while i < self.voices.len() {
            let voice = &mut self.voices[i];
            let clip = &voice.session.clip;
            let frames = (clip.frames() - voice.cursor).min(frame_count);

            for frame in 0..frames {
                let out = &mut data[frame * self.output_channels..(frame + 1) * self.output_channels];
                for (ch, sample) in out.iter_mut().enumerate() {
                    *sample += clip.sample_at(voice.cursor + frame, ch);
                }
            }
            voice.cursor += frames;

            if voice.cursor >= clip.frames() {
                // Order-preserving: index 0 stays the oldest voice.
                let finished = self.voices.remove(i);
                self.retire(finished.session, now);
            } else {
                i += 1;
            }
        }

        for sample in data.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.frames_rendered
            .fetch_add(frame_count as u64, Ordering::Relaxed);
    }

    fn accept_sessions(&mut self, now: Instant) {
        while let Ok(session) = self.channels.submit_consumer.pop() {
            if session.clip.is_empty() {
                self.retire(session, now);
                continue;
            }
            if self.voices.len() == self.max_voices {
                // Oldest voice gives way; its clip is cut short.
                let oldest = self.voices.remove(0);
                self.retire(oldest.session, now);
            }
            self.voices.push(Voice { session, cursor: 0 });
        }
    }

    fn retire(&mut self, session: PlaybackSession, now: Instant) {
        session.completion.fire_at(now);
        // A full retire queue means the scheduler is not draining; dropping
        // here is the only option left.
        let _ = self.channels.retire_producer.push(session);
    }
}
