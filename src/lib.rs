//! Afterward: single-assignment settlement cells with thenable flattening.
//!
//! # Overview
//!
//! A cell starts empty, settles exactly once to a success value or a
//! failure reason, and lets any number of observers chain callbacks
//! before or after settlement. Every callback runs exactly once, on a
//! deferred scheduler turn, with the settled outcome. Candidates
//! produced by callbacks are flattened: a cell resolved with another
//! asynchronous value adopts that value's eventual outcome, however
//! deeply the layers nest and even when a layer is a foreign
//! implementation that cannot be trusted to behave.
//!
//! # Core Guarantees
//!
//! - **Single settlement**: the first settle call wins; later attempts are silent no-ops
//! - **Async-only dispatch**: a callback never runs inside the call that registered it
//! - **Order preservation**: observers dispatch in registration order within a batch
//! - **First-wins flattening**: a foreign thenable firing both continuations, or one
//!   continuation twice, commits only its first delivery
//! - **Cycle defense**: a callback returning its own child cell rejects that child with a
//!   distinguished error instead of recursing
//! - **No ambient authority**: cells schedule onto an explicit [`Defer`] capability; there
//!   is no global registry and no shared mutable global state
//!
//! # Module Structure
//!
//! - [`cell`]: settlement cells, chaining, producer handles
//! - [`resolve`]: the flattening resolver and its continuation handles
//! - [`thenable`]: the foreign-value capability boundary
//! - [`error`]: the rejection taxonomy
//! - [`queue`]: the deferral capability and the deterministic task queue
//! - [`trace`]: structured trace capture for the queue
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use afterward::{Promise, QueueConfig, Resolution, TaskQueue};
//!
//! let queue = Rc::new(TaskQueue::new(QueueConfig::new()));
//!
//! let (cell, settler) = Promise::<u32, String>::deferred(queue.clone());
//! let result = cell
//!     .chain_success(|n| Resolution::Value(*n + 1))
//!     .chain_failure(|_| Resolution::Value(0));
//!
//! settler.resolve(41);
//! queue.run_until_idle();
//! assert_eq!(result.outcome(), Some(Ok(Rc::new(42))));
//! ```
//!
//! The crate is single-threaded by design: cells are `Rc`-shared,
//! mutation happens on one logical thread, and "waiting" is always
//! deferral onto the host's queue, never blocking.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cell;
pub mod error;
pub mod queue;
pub mod resolve;
pub mod thenable;
pub mod trace;

pub use cell::{FailureFn, Outcome, Promise, Settler, SuccessFn};
pub use error::Rejection;
pub use queue::{Defer, Job, QueueConfig, TaskQueue};
pub use resolve::{ReasonSink, ValueSink};
pub use thenable::{Resolution, Thenable};
pub use trace::{TraceBuffer, TraceEvent};
