//! Settlement cells and the chaining surface.
//!
//! A cell starts Pending, settles exactly once to Resolved or Rejected,
//! and holds an ordered list of observers. Settling never runs
//! observers synchronously: it schedules a dispatch pass on the cell's
//! [`Defer`] capability, so a callback is never invoked inside the call
//! that registered or settled it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SETTLEMENT LIFECYCLE                     │
//! │                                                              │
//! │   chain() ──► observers.push ──┐                             │
//! │                                │   dispatch pass (deferred)  │
//! │   Pending ──settle──► Resolved ├─► on_success / pass-through │
//! │       └─────settle──► Rejected ├─► on_failure / pass-through │
//! │                                                              │
//! │   later settle attempts: silent no-op (first wins)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Single settlement**: the first settle call wins; later attempts
//!   are silent no-ops.
//! - **Async-only dispatch**: observers run on a later scheduler turn,
//!   never inside `chain`, `resolve`, or `reject`.
//! - **Order preservation**: observers on one cell dispatch in
//!   registration order within a batch.
//! - **Exactly once**: each observer is dispatched exactly once; each
//!   child cell is settled by exactly one path.
//! - **Cycle defense**: a callback returning its own child cell rejects
//!   that child with [`Rejection::Cycle`] instead of recursing.
//!
//! The dispatch pass swaps the observer list for a fresh empty one
//! before running the batch, so registrations made by a running
//! callback start a new batch and are picked up by a later pass.

use core::cell::RefCell;
use core::fmt;
use std::mem;
use std::rc::Rc;

use crate::error::Rejection;
use crate::queue::Defer;
use crate::resolve::{flatten_into, ReasonSink, ValueSink};
use crate::thenable::{Resolution, Thenable};

/// Shared settled outcome of a cell.
///
/// Payloads are reference-counted so every observer of a cell sees the
/// same value, and so pass-through moves the identical payload into the
/// child cell.
pub type Outcome<T, E> = Result<Rc<T>, Rc<Rejection<E>>>;

/// Success callback attached by a chaining call.
pub type SuccessFn<T, E> = Box<dyn FnOnce(Rc<T>) -> Resolution<T, E>>;

/// Failure callback attached by a chaining call.
pub type FailureFn<T, E> = Box<dyn FnOnce(Rc<Rejection<E>>) -> Resolution<T, E>>;

/// Internal outcome consumer used by the resolver.
pub(crate) type NotifyFn<T, E> = Box<dyn FnOnce(Outcome<T, E>)>;

/// Settlement state of a cell. Monotonic: once non-Pending it never
/// changes, which makes "outcome read only when settled" structural.
enum Settlement<T, E> {
    Pending,
    Resolved(Rc<T>),
    Rejected(Rc<Rejection<E>>),
}

impl<T, E> Settlement<T, E> {
    fn outcome(&self) -> Option<Outcome<T, E>> {
        match self {
            Self::Pending => None,
            Self::Resolved(value) => Some(Ok(Rc::clone(value))),
            Self::Rejected(reason) => Some(Err(Rc::clone(reason))),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved(_) => "resolved",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// One entry in a cell's observer list.
pub(crate) enum Observer<T, E> {
    /// A chaining registration. An absent callback passes the parent's
    /// state and outcome through to the child unchanged.
    Chain {
        on_success: Option<SuccessFn<T, E>>,
        on_failure: Option<FailureFn<T, E>>,
        child: Promise<T, E>,
    },
    /// An internal registration that receives the shared outcome.
    Notify { on_outcome: NotifyFn<T, E> },
}

struct Inner<T, E> {
    settlement: Settlement<T, E>,
    observers: Vec<Observer<T, E>>,
    defer: Rc<dyn Defer>,
}

/// Handle to a settlement cell.
///
/// Cloning the handle shares the cell. All observation goes through the
/// chaining calls; all production goes through a [`Settler`] or the
/// immediate constructors.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use afterward::{Promise, QueueConfig, Resolution, TaskQueue};
///
/// let queue = Rc::new(TaskQueue::new(QueueConfig::new()));
/// let (cell, settler) = Promise::<i32, String>::deferred(queue.clone());
/// let doubled = cell.chain_success(|v| Resolution::Value(*v * 2));
///
/// settler.resolve(21);
/// assert!(doubled.is_pending()); // nothing runs until the queue turns
///
/// queue.run_until_idle();
/// assert_eq!(doubled.outcome(), Some(Ok(Rc::new(42))));
/// ```
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.inner.borrow().settlement.name())
            .field("observers", &self.inner.borrow().observers.len())
            .finish()
    }
}

impl<T: 'static, E: 'static> Promise<T, E> {
    fn with_defer(defer: Rc<dyn Defer>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                settlement: Settlement::Pending,
                observers: Vec::new(),
                defer,
            })),
        }
    }

    /// Lifts a plain value into an immediately resolved cell.
    #[must_use]
    pub fn resolved(defer: Rc<dyn Defer>, value: T) -> Self {
        let cell = Self::with_defer(defer);
        cell.settle(Ok(Rc::new(value)));
        cell
    }

    /// Lifts a reason into an immediately rejected cell.
    #[must_use]
    pub fn rejected(defer: Rc<dyn Defer>, reason: E) -> Self {
        let cell = Self::with_defer(defer);
        cell.settle(Err(Rc::new(Rejection::User(reason))));
        cell
    }

    /// Creates a pending cell together with its producer handle.
    ///
    /// This is the primary construction surface for producer code that
    /// settles a cell from outside a synchronous initializer.
    #[must_use]
    pub fn deferred(defer: Rc<dyn Defer>) -> (Self, Settler<T, E>) {
        let cell = Self::with_defer(defer);
        let settler = Settler { cell: cell.clone() };
        (cell, settler)
    }

    /// Calls `init` synchronously with the producer handle and returns
    /// the cell.
    ///
    /// An `Err` returned by the initializer rejects the cell, unless the
    /// initializer already settled it, in which case the first
    /// settlement stands. The error is therefore acknowledged either
    /// way and `initialize` itself never fails.
    pub fn initialize<F>(defer: Rc<dyn Defer>, init: F) -> Self
    where
        F: FnOnce(&Settler<T, E>) -> Result<(), E>,
    {
        let (cell, settler) = Self::deferred(defer);
        if let Err(reason) = init(&settler) {
            settler.reject(reason);
        }
        cell
    }

    /// Registers an observer pair and returns the new child cell.
    ///
    /// The child settles from the invoked callback's returned candidate
    /// (run through the flattening resolver), or by pass-through of the
    /// parent's outcome where the matching callback is `None`. The
    /// callbacks run on a later scheduler turn, never inside this call.
    pub fn chain(
        &self,
        on_success: Option<SuccessFn<T, E>>,
        on_failure: Option<FailureFn<T, E>>,
    ) -> Self {
        let child = Self::with_defer(self.defer_handle());
        self.register(Observer::Chain {
            on_success,
            on_failure,
            child: child.clone(),
        });
        child
    }

    /// Chains a success callback; failures pass through unchanged.
    pub fn chain_success<F>(&self, on_success: F) -> Self
    where
        F: FnOnce(Rc<T>) -> Resolution<T, E> + 'static,
    {
        self.chain(Some(Box::new(on_success)), None)
    }

    /// Chains a failure callback; successes pass through unchanged.
    ///
    /// The callback may recover by returning a success candidate.
    pub fn chain_failure<F>(&self, on_failure: F) -> Self
    where
        F: FnOnce(Rc<Rejection<E>>) -> Resolution<T, E> + 'static,
    {
        self.chain(None, Some(Box::new(on_failure)))
    }

    /// Returns true while the cell is unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().settlement, Settlement::Pending)
    }

    /// Returns true once the cell settled successfully.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().settlement, Settlement::Resolved(_))
    }

    /// Returns true once the cell settled with a rejection.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.borrow().settlement, Settlement::Rejected(_))
    }

    /// Returns the settled outcome, or `None` while pending.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<T, E>> {
        self.inner.borrow().settlement.outcome()
    }

    /// Returns true if both handles share one cell.
    pub(crate) fn same_cell(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn defer_handle(&self) -> Rc<dyn Defer> {
        Rc::clone(&self.inner.borrow().defer)
    }

    /// The single-assignment transition. No-op unless pending; settling
    /// schedules one dispatch pass for the current observer batch.
    pub(crate) fn settle(&self, outcome: Outcome<T, E>) {
        {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.settlement, Settlement::Pending) {
                return;
            }
            inner.settlement = match outcome {
                Ok(value) => Settlement::Resolved(value),
                Err(reason) => Settlement::Rejected(reason),
            };
        }
        self.schedule_dispatch();
    }

    /// Appends an observer. A registration on an already settled cell
    /// schedules a pass of its own, so late observers still fire.
    pub(crate) fn register(&self, observer: Observer<T, E>) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.observers.push(observer);
            !matches!(inner.settlement, Settlement::Pending)
        };
        if settled {
            self.schedule_dispatch();
        }
    }

    fn schedule_dispatch(&self) {
        let defer = self.defer_handle();
        let cell = self.clone();
        defer.defer(Box::new(move || cell.dispatch()));
    }

    /// One dispatch pass: snapshot the settlement, swap the observer
    /// list for a fresh batch, then run the snapshot in order. The
    /// borrow is released before any callback runs, so callbacks may
    /// freely chain onto or settle any cell, including this one.
    fn dispatch(&self) {
        let (outcome, batch) = {
            let mut inner = self.inner.borrow_mut();
            let Some(outcome) = inner.settlement.outcome() else {
                // Passes are only scheduled after settlement; a pass
                // that finds an empty batch below is a harmless no-op.
                return;
            };
            (outcome, mem::take(&mut inner.observers))
        };
        for observer in batch {
            match observer {
                Observer::Notify { on_outcome } => on_outcome(outcome.clone()),
                Observer::Chain {
                    on_success,
                    on_failure,
                    child,
                } => match &outcome {
                    Ok(value) => match on_success {
                        Some(callback) => flatten_into(callback(Rc::clone(value)), &child),
                        None => child.settle(Ok(Rc::clone(value))),
                    },
                    Err(reason) => match on_failure {
                        Some(callback) => flatten_into(callback(Rc::clone(reason)), &child),
                        None => child.settle(Err(Rc::clone(reason))),
                    },
                },
            }
        }
    }
}

/// A cell consumed through the foreign boundary behaves like a chained
/// cell: its settled outcome forwards through the handles, preserving
/// the rejection variant.
impl<T: 'static, E: 'static> Thenable<T, E> for Promise<T, E> {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<T, E>,
        on_reason: ReasonSink<T, E>,
    ) -> Result<(), E> {
        self.register(Observer::Notify {
            on_outcome: Box::new(move |outcome| match outcome {
                Ok(value) => on_value.deliver_shared(value),
                Err(reason) => on_reason.deliver_shared(reason),
            }),
        });
        Ok(())
    }
}

/// Producer handle for a deferred cell.
///
/// All settle attempts are first-wins: whichever of `resolve`,
/// `resolve_from`, or `reject` commits first decides the outcome, and
/// every later attempt on this handle or any clone of it is a silent
/// no-op.
pub struct Settler<T, E> {
    cell: Promise<T, E>,
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Settler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler").field("cell", &self.cell).finish()
    }
}

impl<T: 'static, E: 'static> Settler<T, E> {
    /// Resolves the cell with a terminal value.
    pub fn resolve(&self, value: T) {
        self.cell.settle(Ok(Rc::new(value)));
    }

    /// Resolves the cell from a candidate, unwrapping asynchronous
    /// layers through the flattening resolver first.
    ///
    /// Resolving with a chain of nested cells converges on the terminal
    /// value at the bottom of the chain. Settlement stays first-wins:
    /// if another settle commits while a candidate is still unwrapping,
    /// the earlier commit stands.
    pub fn resolve_from(&self, candidate: Resolution<T, E>) {
        flatten_into(candidate, &self.cell);
    }

    /// Rejects the cell with a user reason.
    pub fn reject(&self, reason: E) {
        self.cell.settle(Err(Rc::new(Rejection::User(reason))));
    }
}
