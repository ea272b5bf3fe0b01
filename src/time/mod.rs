//! Timer-backed promises.

use crate::promise::CancellablePromise;
use crate::runtime::Handle;
use std::time::Duration;

/// Returns a promise that fulfills with `()` once `duration` has elapsed.
///
/// Cancelling the returned promise clears the underlying timer, so the
/// callback slot is released immediately rather than firing into a settled
/// promise.
#[must_use]
pub fn delay(handle: &Handle, duration: Duration) -> CancellablePromise<()> {
    let (cancellable, settler) = CancellablePromise::pending();
    let id = handle.schedule_after(duration, move || {
        settler.resolve(());
    });
    cancellable.set_cancel_handler(handle.timer_canceller(id));
    cancellable
}

/// Blocks the calling thread for `duration`, driving the loop meanwhile.
///
/// A convenience over [`delay`] plus [`CancellablePromise::wait`]; like every
/// blocking wait, it must not be called from inside a cooperative task.
pub fn sleep(handle: &Handle, duration: Duration) {
    // The delay promise never escapes, so it cannot be cancelled and the
    // wait always ends in fulfillment.
    let _ = delay(handle, duration).wait(handle);
}
