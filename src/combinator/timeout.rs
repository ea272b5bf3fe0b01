//! Timeout combinator: race an operation against a deadline.

use super::cancel_if_possible;
use crate::error::Reason;
use crate::promise::Promise;
use crate::runtime::Handle;
use crate::tasks::TaskEntry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Settles like `operation` if it settles before `duration` elapses;
/// otherwise rejects with [`Reason::Timeout`] carrying the configured
/// duration.
///
/// On timeout the operation is cancelled through its root cancellable, if it
/// has one. If the operation wins, the deadline timer is cleared so it never
/// fires.
///
/// # Panics
///
/// Panics if `duration` is zero.
#[must_use]
pub fn timeout<T: Clone + Send + 'static>(
    handle: &Handle,
    operation: impl Into<TaskEntry<T>>,
    duration: Duration,
) -> Promise<T> {
    assert!(!duration.is_zero(), "timeout must be greater than zero");

    let operation = operation.into().into_promise();
    let timer = crate::time::delay(handle, duration);
    let (promise, settler) = Promise::pending();
    let won = Arc::new(AtomicBool::new(false));

    {
        let settler = settler.clone();
        let won = Arc::clone(&won);
        let timer = timer.clone();
        operation.on_settled(move |outcome| {
            if won.swap(true, Ordering::AcqRel) {
                return;
            }
            settler.settle_outcome(outcome);
            timer.cancel();
        });
    }

    let loser = operation.clone();
    timer.on_settled(move |outcome| {
        // A cancelled timer means the operation already won.
        if outcome.is_err() || won.swap(true, Ordering::AcqRel) {
            return;
        }
        settler.reject(Reason::timeout(duration.as_secs_f64()));
        cancel_if_possible(&loser);
    });

    promise
}
