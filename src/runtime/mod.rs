//! The cooperative event loop.
//!
//! This module provides:
//! - [`EventLoop`]: an explicitly constructed, single-threaded loop instance
//!   (no ambient global); multiple independent loops can coexist
//! - [`Handle`]: the cheap clone handed to everything that spawns tasks,
//!   schedules timers, or blocks on a promise
//! - [`TimerId`]: the cancellation handle for a scheduled timer
//!
//! Application code never runs in parallel: tasks advance only when the loop
//! thread polls them, at explicit await points. Settlement callbacks may fire
//! from other threads; they only ever touch the lock-free wake queue, which
//! the loop thread drains in [`Handle::run_pending_work`].

mod task;
mod timer;

pub use timer::TimerId;

use crate::config::{ConfigError, RuntimeConfig};
use crate::observability::{LogCollector, LogEntry, LogLevel};
use crate::promise::Promise;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use task::{NotifyWaker, ReadyQueue, TaskTable, TaskWaker};
use timer::TimerHeap;

/// Loop state that settlement callbacks and cancel handlers may touch from
/// any thread.
pub(crate) struct LoopShared {
    queue: Arc<ReadyQueue>,
    timers: Mutex<TimerHeap>,
    log: Mutex<LogCollector>,
    started: Instant,
}

impl LoopShared {
    pub(crate) fn log(&self, level: LogLevel, target: &'static str, message: impl Into<String>) {
        let entry = LogEntry::new(self.started.elapsed(), level, target, message);
        self.log.lock().collect(entry);
    }

    /// Cancels a timer before it fires. Returns true if it was still pending.
    pub(crate) fn cancel_timer(&self, id: TimerId) -> bool {
        let cancelled = self.timers.lock().cancel(id);
        if cancelled {
            self.log(LogLevel::Debug, "timer", format!("cancelled timer {id}"));
        }
        cancelled
    }
}

/// A single-threaded cooperative event loop.
///
/// The loop owns a task table, a timer heap, and a log buffer. It does
/// nothing on its own: work happens when a caller drives it through
/// [`EventLoop::block_on`], [`Promise::wait`], or explicit
/// [`Handle::run_pending_work`] pumping.
pub struct EventLoop {
    handle: Handle,
}

impl EventLoop {
    /// Creates a loop with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        let config = RuntimeConfig::default();
        // The default config always passes validation.
        Self::build(config)
    }

    /// Creates a loop from an explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Creates a loop from defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::with_config(RuntimeConfig::from_env()?)
    }

    fn build(config: RuntimeConfig) -> Self {
        let shared = Arc::new(LoopShared {
            queue: Arc::new(ReadyQueue::new()),
            timers: Mutex::new(TimerHeap::new()),
            log: Mutex::new(
                LogCollector::new(config.log_capacity).with_min_level(config.log_level),
            ),
            started: Instant::now(),
        });
        Self {
            handle: Handle {
                tasks: Rc::new(RefCell::new(TaskTable::with_capacity(config.task_capacity))),
                shared,
            },
        }
    }

    /// A handle for spawning, scheduling, and blocking.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Spawns a cooperative task; see [`Handle::spawn`].
    pub fn spawn<T, F>(&self, future: F) -> Promise<T>
    where
        T: Clone + Send + 'static,
        F: Future<Output = T> + 'static,
    {
        self.handle.spawn(future)
    }

    /// Blocks the calling thread on a future; see [`Handle::block_on`].
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Drains due timers and runnable tasks once; see
    /// [`Handle::run_pending_work`].
    pub fn run_pending_work(&self) -> bool {
        self.handle.run_pending_work()
    }

    /// Tears the loop down to its initial state; see [`Handle::reset`].
    pub fn reset(&self) {
        self.handle.reset();
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("tasks", &self.handle.pending_tasks())
            .field("timers", &self.handle.pending_timers())
            .finish()
    }
}

/// Cheap handle to an [`EventLoop`].
///
/// Not `Send`: a handle stays on the loop's own thread. Cross-thread
/// interaction happens through settlement callbacks and timer cancellation,
/// which only touch the thread-safe shared state.
pub struct Handle {
    tasks: Rc<RefCell<TaskTable>>,
    shared: Arc<LoopShared>,
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Self {
            tasks: Rc::clone(&self.tasks),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("tasks", &self.pending_tasks())
            .finish_non_exhaustive()
    }
}

impl Handle {
    /// Spawns a cooperative task and exposes its outcome as a promise.
    ///
    /// The task is polled by the loop, suspending at each `.await`. The
    /// returned promise fulfills with the task's output when it completes.
    pub fn spawn<T, F>(&self, future: F) -> Promise<T>
    where
        T: Clone + Send + 'static,
        F: Future<Output = T> + 'static,
    {
        let (promise, settler) = Promise::pending();
        let task = Box::pin(async move {
            let value = future.await;
            settler.resolve(value);
        });
        let id = self.tasks.borrow_mut().insert(task);
        self.shared
            .log(LogLevel::Debug, "task", format!("spawned task {id}"));
        // Queue the initial poll.
        self.shared.queue.push(id);
        promise
    }

    /// Blocks the calling thread until `future` completes, driving the
    /// loop's pending work in between polls.
    ///
    /// This is the only blocking path in the system. It must never be called
    /// from inside a cooperative task on the same loop: the loop would be
    /// waiting on itself. Inside a task, `.await` instead.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let mut future = Box::pin(future);
        let notify = Arc::new(NotifyWaker::new(Arc::clone(&self.shared.queue)));
        let waker = Waker::from(Arc::clone(&notify));
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                return value;
            }
            self.run_pending_work();
            if notify.take() || !self.shared.queue.is_empty() {
                continue;
            }
            self.idle_wait();
        }
    }

    /// Schedules `callback` to run once `delay` has elapsed, the next time
    /// the loop drains pending work after the deadline.
    pub fn schedule_after(
        &self,
        delay: Duration,
        callback: impl FnOnce() + Send + 'static,
    ) -> TimerId {
        let deadline = Instant::now() + delay;
        let id = self.shared.timers.lock().insert(deadline, Box::new(callback));
        self.shared.log(
            LogLevel::Trace,
            "timer",
            format!("scheduled timer {id} in {:?}", delay),
        );
        // A new earliest deadline must shorten an in-progress park.
        self.shared.queue.push(task::NOTIFY_ID);
        id
    }

    /// Cancels a scheduled timer. Returns true if it had not yet fired.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.shared.cancel_timer(id)
    }

    /// A `Send` closure that cancels the given timer, for cancel handlers
    /// that outlive the handle's thread affinity.
    pub(crate) fn timer_canceller(&self, id: TimerId) -> impl FnOnce() + Send + 'static {
        let shared = Arc::clone(&self.shared);
        move || {
            shared.cancel_timer(id);
        }
    }

    /// Fires due timers and polls every woken task once. Returns true if any
    /// work ran.
    ///
    /// One call makes one pass: wakes queued during the pass (a task that
    /// immediately re-wakes itself, a timer callback scheduling another
    /// timer) wait for the next call.
    pub fn run_pending_work(&self) -> bool {
        let mut ran = false;

        let due = { self.shared.timers.lock().pop_expired(Instant::now()) };
        for callback in due {
            ran = true;
            self.shared.log(LogLevel::Trace, "timer", "timer fired");
            callback();
        }

        let budget = self.shared.queue.len();
        for _ in 0..budget {
            let Some(id) = self.shared.queue.pop() else {
                break;
            };
            // Stale ids (completed tasks, reset survivors, bare notifies)
            // are skipped.
            let Some(mut task) = self.tasks.borrow_mut().take(id) else {
                continue;
            };
            ran = true;
            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                queue: Arc::clone(&self.shared.queue),
            }));
            let mut cx = Context::from_waker(&waker);
            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    self.shared
                        .log(LogLevel::Debug, "task", format!("task {id} completed"));
                }
                Poll::Pending => self.tasks.borrow_mut().restore(id, task),
            }
        }
        ran
    }

    /// Parks the loop thread until a wake arrives or the next timer is due.
    pub(crate) fn idle_wait(&self) {
        if !self.shared.queue.is_empty() {
            return;
        }
        let deadline = self.shared.timers.lock().peek_deadline();
        self.shared.queue.park(deadline);
    }

    /// Drops every task and timer and clears the log, returning the loop to
    /// its initial state. Wakers held by dropped work become stale and are
    /// ignored.
    pub fn reset(&self) {
        self.tasks.borrow_mut().clear();
        self.shared.timers.lock().clear();
        while self.shared.queue.pop().is_some() {}
        self.shared.log.lock().clear();
        self.shared.log(LogLevel::Debug, "runtime", "reset");
    }

    /// Number of live cooperative tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.lock().len()
    }

    /// A snapshot of the collected log entries, oldest first.
    #[must_use]
    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.shared.log.lock().snapshot()
    }
}
