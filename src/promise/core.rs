//! The settlement state machine.

use crate::error::Reason;
use crate::promise::cancel::CancelToken;
use crate::runtime::Handle;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

type Reaction<T> = Box<dyn FnOnce(Result<T, Reason>) + Send>;

enum State<T> {
    Pending {
        reactions: Vec<Reaction<T>>,
        wakers: Vec<Waker>,
    },
    Settled(Result<T, Reason>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending {
                reactions: Vec::new(),
                wakers: Vec::new(),
            }),
        })
    }

    /// Performs the one-way Pending → Settled transition.
    ///
    /// Reactions run after the state lock is released, in registration order;
    /// a second settlement attempt is a no-op.
    fn settle(self: &Arc<Self>, outcome: Result<T, Reason>) {
        let (reactions, wakers) = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending { reactions, wakers } => {
                    let reactions = std::mem::take(reactions);
                    let wakers = std::mem::take(wakers);
                    *state = State::Settled(outcome.clone());
                    (reactions, wakers)
                }
                State::Settled(_) => return,
            }
        };
        for reaction in reactions {
            reaction(outcome.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    fn is_pending(&self) -> bool {
        matches!(&*self.state.lock(), State::Pending { .. })
    }

    fn try_outcome(&self) -> Option<Result<T, Reason>> {
        match &*self.state.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }
}

/// A value that will become available, fail, or never settle.
///
/// `Promise` is a cheap handle: clones share the same settlement cell. The
/// value type must be `Clone` because one settlement fans out to every
/// registered reaction.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
    root: Option<Arc<CancelToken>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            root: self.root.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a pending promise and the settler that controls it.
    #[must_use]
    pub fn pending() -> (Self, Settler<T>) {
        let shared = Shared::new();
        (
            Self {
                shared: Arc::clone(&shared),
                root: None,
            },
            Settler { shared },
        )
    }

    /// Creates a promise from an executor invoked synchronously with the
    /// settler.
    ///
    /// An `Err` returned by the executor is converted into an immediate
    /// rejection, mirroring the convention that synchronous failures inside
    /// an executor settle the promise rather than escaping to the caller.
    pub fn new(executor: impl FnOnce(Settler<T>) -> Result<(), Reason>) -> Self {
        let (promise, settler) = Self::pending();
        if let Err(reason) = executor(settler.clone()) {
            settler.reject(reason);
        }
        promise
    }

    /// Creates an already-fulfilled promise.
    #[must_use]
    pub fn fulfilled(value: T) -> Self {
        let (promise, settler) = Self::pending();
        settler.resolve(value);
        promise
    }

    /// Creates an already-rejected promise.
    #[must_use]
    pub fn rejected(reason: Reason) -> Self {
        let (promise, settler) = Self::pending();
        settler.reject(reason);
        promise
    }

    /// Returns true while unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }

    /// Returns true once fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self.shared.try_outcome(), Some(Ok(_)))
    }

    /// Returns true once rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self.shared.try_outcome(), Some(Err(_)))
    }

    /// The settlement, if any, without blocking.
    #[must_use]
    pub fn try_outcome(&self) -> Option<Result<T, Reason>> {
        self.shared.try_outcome()
    }

    /// The innermost cancellable this promise derives from, if any.
    #[must_use]
    pub fn root_cancellable(&self) -> Option<Arc<CancelToken>> {
        self.root.clone()
    }

    pub(crate) fn with_root(mut self, token: Arc<CancelToken>) -> Self {
        self.root = Some(token);
        self
    }

    /// Registers a reaction invoked with the settlement.
    ///
    /// Runs immediately if the promise has already settled; otherwise runs in
    /// registration order at settlement. Exactly-once either way.
    pub fn on_settled(&self, reaction: impl FnOnce(Result<T, Reason>) + Send + 'static) {
        let reaction: Reaction<T> = Box::new(reaction);
        // Run outside the lock when the promise has already settled.
        let immediate = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending { reactions, .. } => {
                    reactions.push(reaction);
                    None
                }
                State::Settled(outcome) => Some((reaction, outcome.clone())),
            }
        };
        if let Some((reaction, outcome)) = immediate {
            reaction(outcome);
        }
    }

    /// Chains a fulfillment handler, passing rejections through unchanged.
    ///
    /// The handler may return a plain value, another promise (whose
    /// settlement is adopted), or a [`Resolution`] directly.
    pub fn then<U, R, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        R: Into<Resolution<U>>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        let (derived, settler) = Promise::pending();
        self.on_settled(move |outcome| match outcome {
            Ok(value) => settler.settle_resolution(on_fulfilled(value).into()),
            Err(reason) => settler.reject(reason),
        });
        match self.root.clone() {
            Some(token) => derived.with_root(token),
            None => derived,
        }
    }

    /// Chains a rejection handler, passing values through unchanged.
    pub fn catch<R, F>(&self, on_rejected: F) -> Promise<T>
    where
        R: Into<Resolution<T>>,
        F: FnOnce(Reason) -> R + Send + 'static,
    {
        let (derived, settler) = Promise::pending();
        self.on_settled(move |outcome| match outcome {
            Ok(value) => settler.resolve(value),
            Err(reason) => settler.settle_resolution(on_rejected(reason).into()),
        });
        match self.root.clone() {
            Some(token) => derived.with_root(token),
            None => derived,
        }
    }

    /// Chains both handlers at once.
    pub fn then_catch<U, RF, RR, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U>
    where
        U: Clone + Send + 'static,
        RF: Into<Resolution<U>>,
        RR: Into<Resolution<U>>,
        F: FnOnce(T) -> RF + Send + 'static,
        G: FnOnce(Reason) -> RR + Send + 'static,
    {
        let (derived, settler) = Promise::pending();
        self.on_settled(move |outcome| match outcome {
            Ok(value) => settler.settle_resolution(on_fulfilled(value).into()),
            Err(reason) => settler.settle_resolution(on_rejected(reason).into()),
        });
        match self.root.clone() {
            Some(token) => derived.with_root(token),
            None => derived,
        }
    }

    /// Runs a teardown hook on settlement, passing the outcome through.
    pub fn finally(&self, hook: impl FnOnce() + Send + 'static) -> Promise<T> {
        let (derived, settler) = Promise::pending();
        self.on_settled(move |outcome| {
            hook();
            settler.settle_outcome(outcome);
        });
        match self.root.clone() {
            Some(token) => derived.with_root(token),
            None => derived,
        }
    }

    /// Blocks until settlement by driving the event loop's pending work.
    ///
    /// This is the only blocking path in the system. It must never be called
    /// from within a cooperative unit running on the same loop: the loop
    /// would be waiting on itself. Inside a unit, `.await` the promise
    /// instead.
    pub fn wait(&self, handle: &Handle) -> Result<T, Reason> {
        handle.block_on(self.clone())
    }

    pub(crate) fn probe(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let shared = Arc::clone(&self.shared);
        move || shared.is_pending()
    }
}

impl<T: Clone + Send + 'static> Future for Promise<T> {
    type Output = Result<T, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Settled(outcome) => Poll::Ready(outcome.clone()),
            State::Pending { wakers, .. } => {
                // Executors may hand out a different waker on each poll.
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// The resolve/reject capability for one promise.
///
/// Cloneable; every clone settles the same promise, and only the first
/// settlement wins.
pub struct Settler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Settler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Settler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Settler")
    }
}

impl<T: Clone + Send + 'static> Settler<T> {
    /// Resolves the promise.
    ///
    /// Accepts anything promise-like: a plain value fulfills, a promise is
    /// adopted (thenable-flattening), and an explicit [`Resolution`] settles
    /// accordingly. No-op after settlement.
    pub fn resolve(&self, value: impl Into<Resolution<T>>) {
        self.settle_resolution(value.into());
    }

    /// Rejects the promise. No-op after settlement.
    pub fn reject(&self, reason: Reason) {
        self.shared.settle(Err(reason));
    }

    /// Settles with a prepared outcome.
    pub fn settle_outcome(&self, outcome: Result<T, Reason>) {
        self.shared.settle(outcome);
    }

    /// Returns true once the promise has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.shared.is_pending()
    }

    pub(crate) fn settle_resolution(&self, resolution: Resolution<T>) {
        match resolution {
            Resolution::Value(value) => self.shared.settle(Ok(value)),
            Resolution::Reject(reason) => self.shared.settle(Err(reason)),
            Resolution::Chain(promise) => {
                let settler = self.clone();
                promise.on_settled(move |outcome| settler.settle_outcome(outcome));
            }
        }
    }
}

/// The closed set of things a handler or `resolve` call can produce.
///
/// This is the crate's promise-like capability: anything convertible into a
/// `Resolution` can stand in for a settlement, checked once at the
/// conversion site instead of duck-typed at every use.
pub enum Resolution<T> {
    /// Fulfill with a value.
    Value(T),
    /// Adopt another promise's eventual settlement.
    Chain(Promise<T>),
    /// Reject with a reason.
    Reject(Reason),
}

impl<T> From<T> for Resolution<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Self::Chain(promise)
    }
}

impl<T> From<Result<T, Reason>> for Resolution<T> {
    fn from(outcome: Result<T, Reason>) -> Self {
        match outcome {
            Ok(value) => Self::Value(value),
            Err(reason) => Self::Reject(reason),
        }
    }
}
