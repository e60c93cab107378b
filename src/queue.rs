//! Deferral capability and the deterministic task queue.
//!
//! The settlement core never runs observers synchronously; it hands
//! dispatch passes to a [`Defer`] capability supplied by the host. The
//! host contract is a single primitive: the job runs after the current
//! synchronous stack unwinds, and multiple deferrals run in submission
//! order (FIFO). No other host interface is required.
//!
//! [`TaskQueue`] is the crate's own implementation of that contract: a
//! FIFO queue with step accounting, a configurable step ceiling, and
//! structured trace capture. It drives both production embeddings that
//! own their turn loop and the deterministic tests in this crate.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use afterward::{Defer, QueueConfig, TaskQueue};
//!
//! let queue = TaskQueue::new(QueueConfig::new());
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let first = Rc::clone(&log);
//! queue.defer(Box::new(move || first.borrow_mut().push(1)));
//! let second = Rc::clone(&log);
//! queue.defer(Box::new(move || second.borrow_mut().push(2)));
//!
//! assert!(log.borrow().is_empty());
//! queue.run_until_idle();
//! assert_eq!(*log.borrow(), vec![1, 2]);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::VecDeque;

use crate::trace::{TraceBuffer, TraceEvent};

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce()>;

/// The deferral capability the settlement core schedules onto.
///
/// Implementations must run `job` after the current synchronous stack
/// unwinds and must preserve FIFO order among submitted jobs. Both
/// guarantees are load-bearing: they give chains their always-async
/// semantics and their registration-order dispatch.
pub trait Defer {
    /// Enqueues `job` to run on a later turn.
    fn defer(&self, job: Job);
}

/// Configuration for a [`TaskQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    max_steps: Option<u64>,
    trace_capacity: usize,
}

impl QueueConfig {
    /// Default configuration: no step ceiling, tracing disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_steps: None,
            trace_capacity: 0,
        }
    }

    /// Caps the number of steps a single `run_until_idle` call may
    /// execute. A guard against runaway self-perpetuating chains in
    /// tests.
    #[must_use]
    pub const fn with_max_steps(mut self, max: u64) -> Self {
        self.max_steps = Some(max);
        self
    }

    /// Enables trace capture with the given buffer capacity.
    #[must_use]
    pub const fn with_trace_capacity(mut self, capacity: usize) -> Self {
        self.trace_capacity = capacity;
        self
    }

    /// Returns the configured step ceiling, if any.
    #[must_use]
    pub const fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    /// Returns the configured trace capacity.
    #[must_use]
    pub const fn trace_capacity(&self) -> usize {
        self.trace_capacity
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic FIFO task queue.
///
/// Jobs enqueued while another job runs land behind everything already
/// queued, so a drain observes exactly the submission order. The queue
/// is single-threaded; it is driven by calling [`run_next`] or
/// [`run_until_idle`] from the owning turn loop.
///
/// [`run_next`]: TaskQueue::run_next
/// [`run_until_idle`]: TaskQueue::run_until_idle
pub struct TaskQueue {
    jobs: RefCell<VecDeque<Job>>,
    steps: Cell<u64>,
    config: QueueConfig,
    trace: TraceBuffer,
}

impl TaskQueue {
    /// Creates a queue with the given configuration.
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            jobs: RefCell::new(VecDeque::new()),
            steps: Cell::new(0),
            config,
            trace: TraceBuffer::new(config.trace_capacity()),
        }
    }

    /// Returns true when no jobs are queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Alias for [`is_idle`](TaskQueue::is_idle).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_idle()
    }

    /// Returns the number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Returns the total number of jobs executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    /// Returns the queue configuration.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Returns the trace buffer.
    #[must_use]
    pub const fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// Runs the next queued job. Returns false if the queue was idle.
    ///
    /// The queue's borrow is released before the job runs, so jobs may
    /// re-enter the queue freely.
    pub fn run_next(&self) -> bool {
        let job = self.jobs.borrow_mut().pop_front();
        let Some(job) = job else {
            return false;
        };
        let step = self.steps.get() + 1;
        self.steps.set(step);
        self.trace.record(TraceEvent::JobStarted { step });
        job();
        self.trace.record(TraceEvent::JobFinished { step });
        true
    }

    /// Runs jobs until the queue is idle or the configured step ceiling
    /// is reached. Returns the number of steps executed by this call.
    pub fn run_until_idle(&self) -> u64 {
        let start = self.steps.get();
        while !self.is_idle() {
            if let Some(max) = self.config.max_steps() {
                if self.steps.get() - start >= max {
                    return self.steps.get() - start;
                }
            }
            self.run_next();
        }
        self.trace.record(TraceEvent::QueueIdle {
            steps: self.steps.get(),
        });
        self.steps.get() - start
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueConfig::new())
    }
}

impl Defer for TaskQueue {
    fn defer(&self, job: Job) {
        let pending = {
            let mut jobs = self.jobs.borrow_mut();
            jobs.push_back(job);
            jobs.len() - 1
        };
        self.trace.record(TraceEvent::JobEnqueued { pending });
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("queued", &self.len())
            .field("steps", &self.steps.get())
            .field("config", &self.config)
            .finish()
    }
}
