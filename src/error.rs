//! Error types for the settlement core.
//!
//! Every failure inside the crate becomes a [`Rejection`] carried by
//! some cell. Public operations never panic and never raise; a consumer
//! always observes failures as the rejected outcome of a cell it holds.
//!
//! # Taxonomy
//!
//! - **Cycle**: a chaining callback returned the very cell it was meant
//!   to settle. Waiting on that cell could never complete, so the
//!   dispatch pass rejects it with this distinguished reason instead of
//!   recursing.
//! - **User**: a reason supplied by producer code, either through
//!   [`Settler::reject`](crate::Settler::reject), a callback returning
//!   [`Resolution::Reject`](crate::Resolution::Reject), or a foreign
//!   thenable firing its rejection continuation.
//!
//! Double settlement is not an error anywhere in the crate: the first
//! settlement of a cell wins and later attempts are silent no-ops.

use thiserror::Error;

/// Reason carried by a rejected cell.
///
/// The type parameter `E` is the reason type chosen by the consumer of
/// the chain. The extra `Cycle` variant exists so the core can inject
/// the chaining-cycle usage error without constraining `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection<E> {
    /// A chaining callback returned its own child cell.
    #[error("chaining cycle detected: a callback returned its own child cell")]
    Cycle,
    /// A reason supplied by producer or callback code.
    #[error("{0}")]
    User(E),
}

impl<E> Rejection<E> {
    /// Returns true if this rejection is the chaining-cycle usage error.
    #[must_use]
    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle)
    }

    /// Returns the user-supplied reason, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&E> {
        match self {
            Self::User(reason) => Some(reason),
            Self::Cycle => None,
        }
    }

    /// Consumes the rejection, returning the user-supplied reason if any.
    #[must_use]
    pub fn into_user(self) -> Option<E> {
        match self {
            Self::User(reason) => Some(reason),
            Self::Cycle => None,
        }
    }
}
