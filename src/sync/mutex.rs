//! FIFO-fair promise-based mutex.
//!
//! Acquisition is a promise, not a blocking call: [`Mutex::acquire`] returns
//! an already-fulfilled promise when the lock is free, or a pending one that
//! fulfills when this waiter reaches the head of the queue. Waiters are
//! served strictly in `acquire` order; no waiter is ever skipped while an
//! earlier one remains queued.
//!
//! Release is explicit. The promise cell retains a clone of every granted
//! [`LockHandle`], so dropping a handle cannot be the release signal; call
//! [`LockHandle::release`] when done. Releasing twice is a no-op.

use crate::promise::{Promise, Settler};
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct MutexState {
    locked: bool,
    waiters: std::collections::VecDeque<Settler<LockHandle>>,
}

/// A mutual-exclusion lock granting ownership through promises.
///
/// The mutex carries no payload; it serializes access to whatever external
/// resource the caller associates with it.
#[derive(Debug)]
pub struct Mutex {
    state: ParkingMutex<MutexState>,
}

impl Mutex {
    /// Creates an unlocked mutex.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: ParkingMutex::new(MutexState {
                locked: false,
                waiters: std::collections::VecDeque::new(),
            }),
        })
    }

    /// Requests the lock.
    ///
    /// If the mutex is unlocked, it locks immediately and the returned
    /// promise is already fulfilled. Otherwise the caller joins the tail of
    /// the waiter queue and the promise fulfills when ownership is handed
    /// over.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Promise<LockHandle> {
        let mut state = self.state.lock();
        if !state.locked {
            state.locked = true;
            drop(state);
            return Promise::fulfilled(LockHandle::new(Arc::clone(self)));
        }
        let (promise, settler) = Promise::pending();
        state.waiters.push_back(settler);
        promise
    }

    /// Returns true while some handle holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of queued waiters.
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Returns true if no waiter is queued.
    #[must_use]
    pub fn is_queue_empty(&self) -> bool {
        self.state.lock().waiters.is_empty()
    }

    /// Hands the lock to the head waiter, or unlocks if none is queued.
    fn hand_off(self: &Arc<Self>) {
        // Resolve the waiter outside the state lock: its reactions run
        // synchronously and may call back into this mutex.
        let next = {
            let mut state = self.state.lock();
            match state.waiters.pop_front() {
                Some(settler) => Some(settler),
                None => {
                    state.locked = false;
                    None
                }
            }
        };
        if let Some(settler) = next {
            settler.resolve(LockHandle::new(Arc::clone(self)));
        }
    }
}

/// Proof of lock ownership, granted by [`Mutex::acquire`].
///
/// Clones share one released flag, so ownership is handed over exactly once
/// no matter how many clones of the handle exist or how often `release` is
/// called.
#[derive(Clone)]
pub struct LockHandle {
    mutex: Arc<Mutex>,
    released: Arc<AtomicBool>,
}

impl LockHandle {
    fn new(mutex: Arc<Mutex>) -> Self {
        Self {
            mutex,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Releases the lock, handing it to the head waiter if any.
    ///
    /// Idempotent: only the first call transfers ownership.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mutex.hand_off();
    }

    /// Returns true once this handle has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockHandle")
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
