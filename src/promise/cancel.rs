//! Cancellation tokens and cancellable promises.

use crate::error::Reason;
use crate::promise::core::{Promise, Resolution, Settler};
use crate::runtime::Handle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CancelHandler = Box<dyn FnOnce() + Send>;

struct TokenInner {
    handler: Option<CancelHandler>,
    reject: Option<Box<dyn FnOnce(Reason) + Send>>,
    still_pending: Box<dyn Fn() -> bool + Send>,
}

/// The cancellation state shared between a [`CancellablePromise`] and every
/// promise derived from it.
///
/// The flag is monotonic (false → true only). The first effective `cancel`
/// runs the registered teardown handler exactly once and rejects the
/// underlying promise with [`Reason::Cancelled`]; cancelling an
/// already-settled or already-cancelled promise is a no-op.
pub struct CancelToken {
    cancelled: AtomicBool,
    inner: Mutex<TokenInner>,
}

impl CancelToken {
    fn new(
        still_pending: impl Fn() -> bool + Send + 'static,
        reject: impl FnOnce(Reason) + Send + 'static,
    ) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            inner: Mutex::new(TokenInner {
                handler: None,
                reject: Some(Box::new(reject)),
                still_pending: Box::new(still_pending),
            }),
        }
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Requests cancellation.
    ///
    /// No-op if the underlying promise already settled or cancellation was
    /// already requested. Otherwise: marks the token cancelled, runs the
    /// teardown handler, then rejects the promise. The teardown and the
    /// rejection run outside the token's lock, so reactions may re-enter
    /// `cancel` safely.
    pub fn cancel(&self) {
        let (handler, reject) = {
            let mut inner = self.inner.lock();
            if self.cancelled.load(Ordering::Acquire) || !(inner.still_pending)() {
                return;
            }
            self.cancelled.store(true, Ordering::Release);
            (inner.handler.take(), inner.reject.take())
        };
        if let Some(handler) = handler {
            handler();
        }
        if let Some(reject) = reject {
            reject(Reason::Cancelled);
        }
    }

    fn set_handler(&self, handler: CancelHandler) {
        let run_now = {
            let mut inner = self.inner.lock();
            if self.cancelled.load(Ordering::Acquire) {
                // Cancellation raced in before registration; the teardown
                // must not be lost.
                Some(handler)
            } else {
                inner.handler = Some(handler);
                None
            }
        };
        if let Some(handler) = run_now {
            handler();
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A promise paired with a cancel handle.
pub struct CancellablePromise<T> {
    promise: Promise<T>,
    token: Arc<CancelToken>,
}

impl<T> Clone for CancellablePromise<T> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            token: Arc::clone(&self.token),
        }
    }
}

impl<T> std::fmt::Debug for CancellablePromise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellablePromise")
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T> CancellablePromise<T> {
    /// Requests cancellation; see [`CancelToken::cancel`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cancel token, shared with all derived promises.
    #[must_use]
    pub fn token(&self) -> Arc<CancelToken> {
        Arc::clone(&self.token)
    }

    /// A view of the underlying promise (root token attached).
    #[must_use]
    pub fn promise(&self) -> Promise<T> {
        self.promise.clone()
    }

    /// Consumes the handle, returning the underlying promise with the root
    /// token still attached.
    #[must_use]
    pub fn into_promise(self) -> Promise<T> {
        self.promise
    }
}

impl<T: Clone + Send + 'static> CancellablePromise<T> {
    /// Creates a pending cancellable promise and its settler.
    #[must_use]
    pub fn pending() -> (Self, Settler<T>) {
        let (promise, settler) = Promise::pending();
        let reject_settler = settler.clone();
        let token = Arc::new(CancelToken::new(promise.probe(), move |reason| {
            reject_settler.reject(reason);
        }));
        let promise = promise.with_root(Arc::clone(&token));
        (Self { promise, token }, settler)
    }

    /// Creates a cancellable promise from an executor, with the same
    /// synchronous-failure convention as [`Promise::new`].
    pub fn new(executor: impl FnOnce(Settler<T>) -> Result<(), Reason>) -> Self {
        let (cancellable, settler) = Self::pending();
        if let Err(reason) = executor(settler.clone()) {
            settler.reject(reason);
        }
        cancellable
    }

    /// Supplies the external teardown run when cancellation is first
    /// requested (e.g. clearing a timer).
    ///
    /// If cancellation already happened, the teardown runs immediately so it
    /// is never lost.
    pub fn set_cancel_handler(&self, handler: impl FnOnce() + Send + 'static) {
        if self.token.is_cancelled() {
            handler();
        } else {
            self.token.set_handler(Box::new(handler));
        }
    }

    /// Returns true while unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.promise.is_pending()
    }

    /// Returns true once fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.promise.is_fulfilled()
    }

    /// Returns true once rejected (including rejection by cancellation).
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.promise.is_rejected()
    }

    /// Registers a settlement reaction; see [`Promise::on_settled`].
    pub fn on_settled(&self, reaction: impl FnOnce(Result<T, Reason>) + Send + 'static) {
        self.promise.on_settled(reaction);
    }

    /// Chains a fulfillment handler; the derived promise carries this
    /// cancellable as its root.
    pub fn then<U, R, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        R: Into<Resolution<U>>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        self.promise.then(on_fulfilled)
    }

    /// Chains a rejection handler; the derived promise carries this
    /// cancellable as its root.
    pub fn catch<R, F>(&self, on_rejected: F) -> Promise<T>
    where
        R: Into<Resolution<T>>,
        F: FnOnce(Reason) -> R + Send + 'static,
    {
        self.promise.catch(on_rejected)
    }

    /// Blocks until settlement; see [`Promise::wait`].
    pub fn wait(&self, handle: &Handle) -> Result<T, Reason> {
        self.promise.wait(handle)
    }
}
