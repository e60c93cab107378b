//! Thenable capability boundary.
//!
//! A chain step produces a [`Resolution`]: the candidate fed to the
//! flattening resolver. Plain values and immediate rejections are
//! terminal by construction, so the resolver settles them without any
//! probing. Asynchronous candidates come in two forms: another cell of
//! this crate ([`Resolution::Chain`]), which is trusted to report its
//! outcome exactly once, and a foreign value ([`Resolution::Foreign`]),
//! which is not.
//!
//! Foreign values are admitted through the [`Thenable`] trait: a single
//! method receiving two continuation handles. This is the explicit
//! capability check that replaces duck-typed probing; deciding whether a
//! candidate participates in flattening is a total enum match, so the
//! probe itself cannot fail. A fallible foreign boundary is expressed
//! through the `Result` returned by [`Thenable::subscribe`], and
//! misbehaving implementations that fire their continuations more than
//! once (or fire both) are defused by the resolver's first-wins latch.
//!
//! # Example
//!
//! A foreign value that produces its payload synchronously:
//!
//! ```
//! use std::rc::Rc;
//! use afterward::{Promise, QueueConfig, ReasonSink, Resolution, TaskQueue, Thenable, ValueSink};
//!
//! struct Immediate(i32);
//!
//! impl Thenable<i32, String> for Immediate {
//!     fn subscribe(
//!         self: Box<Self>,
//!         on_value: ValueSink<i32, String>,
//!         _on_reason: ReasonSink<i32, String>,
//!     ) -> Result<(), String> {
//!         on_value.deliver(Resolution::Value(self.0));
//!         Ok(())
//!     }
//! }
//!
//! let queue = Rc::new(TaskQueue::new(QueueConfig::new()));
//! let (cell, settler) = Promise::<i32, String>::deferred(queue.clone());
//! settler.resolve_from(Resolution::foreign(Immediate(3)));
//! queue.run_until_idle();
//! assert_eq!(cell.outcome(), Some(Ok(Rc::new(3))));
//! ```

use core::fmt;

use crate::cell::Promise;
use crate::resolve::{ReasonSink, ValueSink};

/// A foreign asynchronous value.
///
/// Implementations settle eventually by firing one of the two handles:
/// `on_value` with the next resolution step (which may itself be
/// asynchronous and is unwrapped recursively), or `on_reason` with a
/// failure reason. The handles may be stored and fired on a later
/// scheduler turn; only the first delivery across both handles has
/// effect.
pub trait Thenable<T, E> {
    /// Registers interest in this value's eventual outcome.
    ///
    /// # Errors
    ///
    /// May return an error to signal that the subscription itself
    /// failed. The resolver rejects the flatten target with that reason
    /// unless one of the handles already fired synchronously, in which
    /// case the earlier delivery wins and the error is swallowed.
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<T, E>,
        on_reason: ReasonSink<T, E>,
    ) -> Result<(), E>;
}

/// Candidate fed to the flattening resolver.
///
/// Produced by chain callbacks and accepted by
/// [`Settler::resolve_from`](crate::Settler::resolve_from).
pub enum Resolution<T, E> {
    /// A terminal success value. The fast path: settles directly, no
    /// capability probe involved.
    Value(T),
    /// An immediate failure with a user reason.
    Reject(E),
    /// Adopt the eventual outcome of another cell of this crate.
    Chain(Promise<T, E>),
    /// Adopt the eventual outcome of an untrusted foreign value.
    Foreign(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wraps a foreign thenable as a candidate.
    #[must_use]
    pub fn foreign<Th>(thenable: Th) -> Self
    where
        Th: Thenable<T, E> + 'static,
    {
        Self::Foreign(Box::new(thenable))
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Reject(reason) => f.debug_tuple("Reject").field(reason).finish(),
            Self::Chain(cell) => f.debug_tuple("Chain").field(cell).finish(),
            Self::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}
