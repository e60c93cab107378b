//! Flattening resolver.
//!
//! Given a candidate [`Resolution`], decides how to settle a target
//! cell. Terminal variants settle the target directly. A chained cell
//! of this crate forwards its eventual outcome into the target. A
//! foreign thenable is subscribed through its capability method, with
//! every delivery funneled through a first-wins latch because foreign
//! implementations are not trusted to fire their continuations at most
//! once. A delivered value may itself be asynchronous; the resolver
//! recurses until a terminal value or reason surfaces, however deep the
//! nesting.
//!
//! # First-wins latch
//!
//! Each flatten invocation that crosses the foreign boundary owns a
//! fresh two-state latch (unfired/fired) shared by the pair of handles
//! it hands out. The first delivery across the pair claims the latch;
//! later deliveries are no-ops. The latch lives exactly as long as one
//! resolution attempt: a nested foreign level gets a latch of its own.

use core::cell::Cell;
use core::fmt;
use std::rc::Rc;

use crate::cell::{Observer, Promise};
use crate::error::Rejection;
use crate::thenable::Resolution;

/// Settles `target` from `candidate`, unwrapping asynchronous layers.
///
/// Settlement of the target stays first-wins: if the target was already
/// settled by the time a layer reports, the report is a no-op.
pub(crate) fn flatten_into<T, E>(candidate: Resolution<T, E>, target: &Promise<T, E>)
where
    T: 'static,
    E: 'static,
{
    match candidate {
        Resolution::Value(value) => target.settle(Ok(Rc::new(value))),
        Resolution::Reject(reason) => target.settle(Err(Rc::new(Rejection::User(reason)))),
        Resolution::Chain(cell) => {
            // Settling a cell with itself could never complete.
            if cell.same_cell(target) {
                target.settle(Err(Rc::new(Rejection::Cycle)));
                return;
            }
            let forward = target.clone();
            cell.register(Observer::Notify {
                on_outcome: Box::new(move |outcome| forward.settle(outcome)),
            });
        }
        Resolution::Foreign(thenable) => {
            let shared = Rc::new(FlattenShared {
                fired: Cell::new(false),
                target: target.clone(),
            });
            let on_value = ValueSink {
                shared: Rc::clone(&shared),
            };
            let on_reason = ReasonSink {
                shared: Rc::clone(&shared),
            };
            if let Err(reason) = thenable.subscribe(on_value, on_reason) {
                // A continuation that fired synchronously wins over the error.
                if shared.claim() {
                    shared.target.settle(Err(Rc::new(Rejection::User(reason))));
                }
            }
        }
    }
}

/// State shared by the handle pair of one flatten invocation.
struct FlattenShared<T, E> {
    fired: Cell<bool>,
    target: Promise<T, E>,
}

impl<T, E> FlattenShared<T, E> {
    /// Claims the latch. Returns true for the first claim only.
    fn claim(&self) -> bool {
        !self.fired.replace(true)
    }
}

/// Success continuation handed to a foreign thenable.
///
/// Delivering recurses into the resolver, so the payload may itself be
/// a chained cell or another foreign thenable. Only the first delivery
/// across this handle and its paired [`ReasonSink`] has effect.
pub struct ValueSink<T, E> {
    shared: Rc<FlattenShared<T, E>>,
}

impl<T: 'static, E: 'static> ValueSink<T, E> {
    /// Delivers the next resolution step for the awaited value.
    pub fn deliver(&self, candidate: Resolution<T, E>) {
        if self.shared.claim() {
            flatten_into(candidate, &self.shared.target);
        }
    }

    /// Delivers an already-shared terminal value.
    ///
    /// Used when the payload is held behind an `Rc`, as when one cell of
    /// this crate is consumed through the foreign boundary.
    pub fn deliver_shared(&self, value: Rc<T>) {
        if self.shared.claim() {
            self.shared.target.settle(Ok(value));
        }
    }
}

impl<T, E> Clone for ValueSink<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for ValueSink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSink")
            .field("fired", &self.shared.fired.get())
            .finish()
    }
}

/// Failure continuation handed to a foreign thenable.
///
/// Only the first delivery across this handle and its paired
/// [`ValueSink`] has effect.
pub struct ReasonSink<T, E> {
    shared: Rc<FlattenShared<T, E>>,
}

impl<T: 'static, E: 'static> ReasonSink<T, E> {
    /// Delivers a failure reason for the awaited value.
    pub fn deliver(&self, reason: E) {
        if self.shared.claim() {
            self.shared
                .target
                .settle(Err(Rc::new(Rejection::User(reason))));
        }
    }

    /// Delivers an already-shared rejection, preserving its variant.
    pub fn deliver_shared(&self, reason: Rc<Rejection<E>>) {
        if self.shared.claim() {
            self.shared.target.settle(Err(reason));
        }
    }
}

impl<T, E> Clone for ReasonSink<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for ReasonSink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasonSink")
            .field("fired", &self.shared.fired.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{QueueConfig, TaskQueue};

    fn queue() -> Rc<TaskQueue> {
        Rc::new(TaskQueue::new(QueueConfig::new()))
    }

    #[test]
    fn value_candidate_settles_terminal() {
        let queue = queue();
        let (cell, _settler) = Promise::<i32, &str>::deferred(queue.clone());
        flatten_into(Resolution::Value(9), &cell);
        assert_eq!(cell.outcome(), Some(Ok(Rc::new(9))));
    }

    #[test]
    fn reject_candidate_wraps_user_reason() {
        let queue = queue();
        let (cell, _settler) = Promise::<i32, &str>::deferred(queue.clone());
        flatten_into(Resolution::Reject("nope"), &cell);
        assert_eq!(cell.outcome(), Some(Err(Rc::new(Rejection::User("nope")))));
    }

    #[test]
    fn chaining_a_cell_onto_itself_rejects_with_cycle() {
        let queue = queue();
        let (cell, _settler) = Promise::<i32, &str>::deferred(queue.clone());
        flatten_into(Resolution::Chain(cell.clone()), &cell);
        assert_eq!(cell.outcome(), Some(Err(Rc::new(Rejection::Cycle))));
    }

    #[test]
    fn latch_claims_exactly_once() {
        let queue = queue();
        let (cell, _settler) = Promise::<i32, &str>::deferred(queue.clone());
        let shared = Rc::new(FlattenShared {
            fired: Cell::new(false),
            target: cell,
        });
        assert!(shared.claim());
        assert!(!shared.claim());
        assert!(!shared.claim());
    }
}
