// SessionQueue - lock-free hand-off of playback sessions with dual SPSC queues
//
// Sessions are created on the scheduler thread and played on the audio thread.
// Dropping a session releases an Arc (and possibly the last reference to a clip
// buffer), which must not happen inside the real-time callback. Finished
// sessions therefore travel back on a second queue and are dropped by the
// scheduler.
//
// Architecture:
// - SUBMIT_QUEUE: scheduler pushes new sessions, audio thread consumes
// - RETIRE_QUEUE: audio thread pushes finished sessions, scheduler drains
//
// Session flow:
// 1. Scheduler pushes a session to SUBMIT_QUEUE
// 2. Audio thread pops it and mixes the clip into the output
// 3. Audio thread fires the completion marker after the clip's last frame
// 4. Audio thread pushes the session to RETIRE_QUEUE
// 5. Scheduler drains RETIRE_QUEUE before its next submission

use rtrb::{Consumer, Producer};

use super::session::PlaybackSession;

/// Default number of sessions that may be in flight at once
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Scheduler-side ends of the dual queue
pub struct SchedulerChannels {
    /// Producer for handing new sessions to the audio thread
    pub submit_producer: Producer<PlaybackSession>,
    /// Consumer for collecting finished sessions
    pub retire_consumer: Consumer<PlaybackSession>,
}

/// Audio-thread-side ends of the dual queue
pub struct AudioThreadChannels {
    /// Consumer for receiving new sessions
    pub submit_consumer: Consumer<PlaybackSession>,
    /// Producer for returning finished sessions
    pub retire_producer: Producer<PlaybackSession>,
}

/// All four queue ends, as created.
pub struct SessionQueueChannels {
    pub submit_producer: Producer<PlaybackSession>,
    pub submit_consumer: Consumer<PlaybackSession>,
    pub retire_producer: Producer<PlaybackSession>,
    pub retire_consumer: Consumer<PlaybackSession>,
}

impl SessionQueueChannels {
    /// Split into the ends owned by each thread.
    pub fn split_for_threads(self) -> (SchedulerChannels, AudioThreadChannels) {
        (
            SchedulerChannels {
                submit_producer: self.submit_producer,
                retire_consumer: self.retire_consumer,
            },
            AudioThreadChannels {
                submit_consumer: self.submit_consumer,
                retire_producer: self.retire_producer,
            },
        )
    }
}

/// Lock-free session queue using dual SPSC ring buffers
///
/// # Thread Safety
/// - Lock-free: No mutex locks in queue operations
/// - Wait-free: Push/pop operations have bounded execution time
pub struct SessionQueue;

impl SessionQueue {
    /// Create both ring buffers with room for `capacity` sessions each.
    ///
    /// # Panics
    /// Panics if capacity is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> SessionQueueChannels {
        assert!(capacity > 0, "capacity must be greater than 0");

        let (submit_producer, submit_consumer) = rtrb::RingBuffer::new(capacity);
        let (retire_producer, retire_consumer) = rtrb::RingBuffer::new(capacity);

        SessionQueueChannels {
            submit_producer,
            submit_consumer,
            retire_producer,
            retire_consumer,
        }
    }
}

impl SchedulerChannels {
    /// Drop every session the audio thread has finished with.
    ///
    /// Returns the number of sessions retired.
    pub fn drain_retired(&mut self) -> usize {
        let mut retired = 0;
        while self.retire_consumer.pop().is_ok() {
            retired += 1;
        }
        retired
    }
}
