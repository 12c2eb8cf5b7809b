//! Relay latency tracking.
//!
//! A measurement starts when the bridge accepts a message and closes when a
//! pier reports a successful send. Closed measurements go into a bounded ring
//! of nanosecond samples read by the diagnostics command.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::common::{Message, MessageId};

/// Shared latency bookkeeping. Safe to use from both piers at once.
#[derive(Debug)]
pub struct MessageTimings {
    in_flight: Mutex<HashMap<MessageId, InFlight>>,
    samples: Mutex<VecDeque<u64>>,
    capacity: usize,
}

impl MessageTimings {
    pub fn new(capacity: usize) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            samples: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Start measuring a message submitted at `started` that will be sent `sends` times.
    pub fn begin(&self, message: &Message, started: Instant, sends: usize) {
        if sends == 0 {
            return;
        }
        lock(&self.in_flight).insert(
            message.id,
            InFlight {
                started,
                pending_sends: sends,
            },
        );
    }

    /// Close the measurement for a message sent at `sent_at`.
    ///
    /// Messages sent to several networks record one sample per send. Messages
    /// never passed to [`begin`](Self::begin) are measured from their receive time.
    pub fn add_to_timing(&self, message: &Message, sent_at: Instant) {
        let started = self.complete_send(message.id).unwrap_or(message.received_at);
        let elapsed = sent_at.saturating_duration_since(started);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        let mut samples = lock(&self.samples);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// A send failed: no sample, but the send no longer counts as pending.
    pub fn send_failed(&self, id: MessageId) {
        self.complete_send(id);
    }

    /// Count one send as done, forgetting the message after its last send.
    fn complete_send(&self, id: MessageId) -> Option<Instant> {
        let mut in_flight = lock(&self.in_flight);
        let entry = in_flight.get_mut(&id)?;
        let started = entry.started;
        entry.pending_sends -= 1;
        if entry.pending_sends == 0 {
            in_flight.remove(&id);
        }
        Some(started)
    }

    /// Snapshot of the recorded samples, oldest first.
    pub fn message_times(&self) -> Vec<u64> {
        lock(&self.samples).iter().copied().collect()
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    started: Instant,
    pending_sends: usize,
}

/// Lock a mutex, ignoring poisoning: the data is plain counters and stays usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
