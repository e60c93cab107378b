//! Structured trace capture for the task queue.
//!
//! Events record what the queue did and in which order, without any
//! stdout/stderr in the core. The buffer is capacity-bounded; once
//! full, further events are counted as dropped rather than silently
//! discarded. Events serialize with serde, so a test or an embedding
//! can export a drain as line-oriented JSON for diagnosis.

use core::cell::{Cell, RefCell};
use serde::Serialize;

/// A single recorded queue event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A job was enqueued behind `pending` already-queued jobs.
    JobEnqueued {
        /// Jobs ahead of this one at submission time.
        pending: usize,
    },
    /// The job counted as `step` started running.
    JobStarted {
        /// One-based step number.
        step: u64,
    },
    /// The job counted as `step` finished running.
    JobFinished {
        /// One-based step number.
        step: u64,
    },
    /// The queue drained to idle.
    QueueIdle {
        /// Total steps executed since the queue was created.
        steps: u64,
    },
}

/// Capacity-bounded event buffer.
///
/// A capacity of zero disables recording entirely, which is the
/// default for production queues.
#[derive(Debug)]
pub struct TraceBuffer {
    events: RefCell<Vec<TraceEvent>>,
    capacity: usize,
    dropped: Cell<u64>,
}

impl TraceBuffer {
    /// Creates a buffer holding up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            capacity,
            dropped: Cell::new(0),
        }
    }

    /// Records an event, or counts it as dropped once full.
    pub fn record(&self, event: TraceEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.borrow_mut();
        if events.len() < self.capacity {
            events.push(event);
        } else {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    /// Returns a copy of the recorded events in record order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Returns how many events were dropped at capacity.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
