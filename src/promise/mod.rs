//! Settle-once promises with chained reactions and cancellation.
//!
//! A [`Promise`] is a shared cell that transitions exactly once from pending
//! to fulfilled or rejected. Reactions registered while pending run in
//! registration order at settlement; reactions registered afterwards run
//! immediately. Derived promises produced by [`Promise::then`] and friends
//! chain settlements, flattening promise-valued handler results instead of
//! nesting them.
//!
//! # Awaiting
//!
//! Inside a cooperative unit (a future spawned on the event loop), a promise
//! is awaited directly, since `Promise` implements [`Future`](std::future::Future)
//! and suspends the unit via its waker until settlement. Outside any unit,
//! [`Promise::wait`] is the blocking fallback: it drives the event loop's
//! pending work until the promise settles. That fallback must never be called
//! from within a cooperative unit, since it would stall the very loop the
//! other units depend on.
//!
//! # Cancellation
//!
//! [`CancellablePromise`] pairs a promise with a [`CancelToken`]: a monotonic
//! flag, an exactly-once teardown handler, and a hook that rejects the
//! promise with a cancellation reason while it is still pending. Promises
//! derived from a cancellable carry the token as their *root cancellable*, so
//! combinators can cancel a losing branch even when handed a `.then()` chain
//! rather than the cancellable itself.

pub mod cancel;
pub mod core;

pub use cancel::{CancelToken, CancellablePromise};
pub use core::{Promise, Resolution, Settler};
