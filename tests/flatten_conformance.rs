//! Conformance tests for the flattening resolver and the foreign
//! boundary.
//!
//! Covers terminal fast paths, nested cells, foreign thenables that
//! behave, foreign thenables that misbehave (double fire, fire both,
//! fail after firing), and the first-wins latch that defuses them.

use std::cell::RefCell;
use std::rc::Rc;

use afterward::{
    Promise, QueueConfig, ReasonSink, Rejection, Resolution, TaskQueue, Thenable, ValueSink,
};

fn queue() -> Rc<TaskQueue> {
    Rc::new(TaskQueue::new(QueueConfig::new()))
}

type Reason = &'static str;
type Sinks = (ValueSink<i32, Reason>, ReasonSink<i32, Reason>);

/// Well-behaved thenable producing its payload synchronously.
struct Immediate(i32);

impl Thenable<i32, Reason> for Immediate {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        _on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        on_value.deliver(Resolution::Value(self.0));
        Ok(())
    }
}

/// Fires the rejection continuation first, then tries to resolve.
struct RejectsThenResolves;

impl Thenable<i32, Reason> for RejectsThenResolves {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        on_reason.deliver("refused");
        on_value.deliver(Resolution::Value(1));
        Ok(())
    }
}

/// Fires the value continuation twice.
struct ResolvesTwice;

impl Thenable<i32, Reason> for ResolvesTwice {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        _on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        on_value.deliver(Resolution::Value(1));
        on_value.deliver(Resolution::Value(2));
        Ok(())
    }
}

/// Delivers a value, then reports a subscription failure.
struct ResolvesThenFails;

impl Thenable<i32, Reason> for ResolvesThenFails {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        _on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        on_value.deliver(Resolution::Value(7));
        Err("broke after delivering")
    }
}

/// Fails without firing either continuation.
struct NeverSubscribes;

impl Thenable<i32, Reason> for NeverSubscribes {
    fn subscribe(
        self: Box<Self>,
        _on_value: ValueSink<i32, Reason>,
        _on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        Err("no subscription")
    }
}

/// Wraps its payload in `depth` further foreign layers.
struct Layered {
    depth: u32,
    value: i32,
}

impl Thenable<i32, Reason> for Layered {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        _on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        if self.depth == 0 {
            on_value.deliver(Resolution::Value(self.value));
        } else {
            on_value.deliver(Resolution::foreign(Layered {
                depth: self.depth - 1,
                value: self.value,
            }));
        }
        Ok(())
    }
}

/// Stashes its continuations for the test to fire later.
struct Stash(Rc<RefCell<Option<Sinks>>>);

impl Thenable<i32, Reason> for Stash {
    fn subscribe(
        self: Box<Self>,
        on_value: ValueSink<i32, Reason>,
        on_reason: ReasonSink<i32, Reason>,
    ) -> Result<(), Reason> {
        *self.0.borrow_mut() = Some((on_value, on_reason));
        Ok(())
    }
}

#[test]
fn foreign_value_resolves_the_target() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(Immediate(3)));
    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(3))));
}

#[test]
fn rejection_continuation_short_circuits() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(RejectsThenResolves));
    queue.run_until_idle();
    assert_eq!(
        cell.outcome(),
        Some(Err(Rc::new(Rejection::User("refused"))))
    );
}

#[test]
fn only_the_first_value_delivery_counts() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(ResolvesTwice));
    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(1))));
}

#[test]
fn subscription_failure_after_delivery_is_swallowed() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(ResolvesThenFails));
    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(7))));
}

#[test]
fn subscription_failure_without_delivery_rejects() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(NeverSubscribes));
    queue.run_until_idle();
    assert_eq!(
        cell.outcome(),
        Some(Err(Rc::new(Rejection::User("no subscription"))))
    );
}

#[test]
fn nested_foreign_layers_unwrap_to_the_terminal_value() {
    let queue = queue();
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(Layered {
        depth: 4,
        value: 11,
    }));
    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(11))));
}

#[test]
fn stashed_continuations_settle_on_a_later_turn() {
    let queue = queue();
    let slot: Rc<RefCell<Option<Sinks>>> = Rc::new(RefCell::new(None));

    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(Stash(Rc::clone(&slot))));
    queue.run_until_idle();
    assert!(cell.is_pending());

    let (on_value, on_reason) = slot.borrow_mut().take().expect("sinks stashed");
    on_value.deliver(Resolution::Value(8));
    on_reason.deliver("too late");
    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(8))));
}

#[test]
fn nested_cells_flatten_to_the_terminal_value() {
    let queue = queue();
    let innermost = Promise::<i32, Reason>::resolved(queue.clone(), 42);

    let (middle, middle_settler) = Promise::<i32, Reason>::deferred(queue.clone());
    middle_settler.resolve_from(Resolution::Chain(innermost));

    let (outer, outer_settler) = Promise::<i32, Reason>::deferred(queue.clone());
    outer_settler.resolve_from(Resolution::Chain(middle));

    queue.run_until_idle();
    assert_eq!(outer.outcome(), Some(Ok(Rc::new(42))));
}

#[test]
fn chained_cell_forwards_its_rejection() {
    let queue = queue();
    let inner = Promise::<i32, Reason>::rejected(queue.clone(), "bad");
    let (outer, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::Chain(inner));
    queue.run_until_idle();
    assert_eq!(outer.outcome(), Some(Err(Rc::new(Rejection::User("bad")))));
}

#[test]
fn pending_chained_cell_settles_the_target_later() {
    let queue = queue();
    let (inner, inner_settler) = Promise::<i32, Reason>::deferred(queue.clone());
    let (outer, outer_settler) = Promise::<i32, Reason>::deferred(queue.clone());

    outer_settler.resolve_from(Resolution::Chain(inner));
    queue.run_until_idle();
    assert!(outer.is_pending());

    inner_settler.resolve(6);
    queue.run_until_idle();
    assert_eq!(outer.outcome(), Some(Ok(Rc::new(6))));
}

#[test]
fn own_cell_through_the_foreign_boundary_preserves_cycle_rejections() {
    let queue = queue();

    // Reject a cell with the distinguished cycle reason by resolving it
    // with itself.
    let (cyclic, cyclic_settler) = Promise::<i32, Reason>::deferred(queue.clone());
    cyclic_settler.resolve_from(Resolution::Chain(cyclic.clone()));

    let (outer, settler) = Promise::<i32, Reason>::deferred(queue.clone());
    settler.resolve_from(Resolution::foreign(cyclic));
    queue.run_until_idle();

    assert_eq!(outer.outcome(), Some(Err(Rc::new(Rejection::Cycle))));
}

#[test]
fn callback_returning_a_chained_cell_flattens() {
    let queue = queue();
    let other = Promise::<i32, Reason>::resolved(queue.clone(), 10);
    let cell = Promise::<i32, Reason>::resolved(queue.clone(), 0);
    let child = cell.chain_success(move |_| Resolution::Chain(other.clone()));
    queue.run_until_idle();
    assert_eq!(child.outcome(), Some(Ok(Rc::new(10))));
}

#[test]
fn callback_returning_a_foreign_value_flattens() {
    let queue = queue();
    let cell = Promise::<i32, Reason>::resolved(queue.clone(), 0);
    let child = cell.chain_success(|_| Resolution::foreign(Immediate(5)));
    queue.run_until_idle();
    assert_eq!(child.outcome(), Some(Ok(Rc::new(5))));
}

#[test]
fn direct_resolution_outruns_a_pending_candidate() {
    let queue = queue();
    let (inner, inner_settler) = Promise::<i32, Reason>::deferred(queue.clone());
    let (cell, settler) = Promise::<i32, Reason>::deferred(queue.clone());

    settler.resolve_from(Resolution::Chain(inner));
    settler.resolve(1);
    inner_settler.resolve(2);

    queue.run_until_idle();
    assert_eq!(cell.outcome(), Some(Ok(Rc::new(1))));
}
