//! Cooperative task storage and wake delivery.
//!
//! Tasks are type-erased futures keyed by a monotonic id. Wakers push ids
//! onto a lock-free ready queue, which is the only structure settlement
//! callbacks on foreign threads ever touch; the loop thread drains it and
//! polls the named tasks. An id whose task has already completed (or was
//! cleared by a reset) is a stale wakeup and is ignored.

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Wake;
use std::thread::Thread;
use std::time::Instant;

pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Wake id that never names a task; it exists only to make the queue
/// non-empty so a parked loop thread notices the wake.
pub(crate) const NOTIFY_ID: u64 = u64::MAX;

/// Lock-free wake queue plus the parking slot of the loop thread.
pub(crate) struct ReadyQueue {
    ready: SegQueue<u64>,
    parked: Mutex<Option<Thread>>,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            ready: SegQueue::new(),
            parked: Mutex::new(None),
        }
    }

    pub(crate) fn push(&self, id: u64) {
        self.ready.push(id);
        if let Some(thread) = self.parked.lock().take() {
            thread.unpark();
        }
    }

    pub(crate) fn pop(&self) -> Option<u64> {
        self.ready.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.ready.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Parks the current thread until a wake arrives or `deadline` passes.
    ///
    /// The parking slot is published before the final emptiness check, so a
    /// `push` that races with parking either lands in the re-check or leaves
    /// an unpark token that makes the park return immediately.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        *self.parked.lock() = Some(std::thread::current());
        if self.ready.is_empty() {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::park_timeout(deadline - now);
                    }
                }
                None => std::thread::park(),
            }
        }
        self.parked.lock().take();
    }
}

/// Waker that marks one task runnable.
pub(crate) struct TaskWaker {
    pub(crate) id: u64,
    pub(crate) queue: Arc<ReadyQueue>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.queue.push(self.id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.push(self.id);
    }
}

/// Waker used by the blocking entry points: records the wake in a flag the
/// blocked caller polls, and nudges the queue so a park ends.
pub(crate) struct NotifyWaker {
    woken: AtomicBool,
    queue: Arc<ReadyQueue>,
}

impl NotifyWaker {
    pub(crate) fn new(queue: Arc<ReadyQueue>) -> Self {
        Self {
            woken: AtomicBool::new(false),
            queue,
        }
    }

    /// Consumes the pending wake, if any.
    pub(crate) fn take(&self) -> bool {
        self.woken.swap(false, Ordering::AcqRel)
    }
}

impl Wake for NotifyWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.store(true, Ordering::Release);
        self.queue.push(NOTIFY_ID);
    }
}

/// Owner of every live cooperative task. Loop-thread only.
pub(crate) struct TaskTable {
    tasks: HashMap<u64, TaskFuture>,
    next_id: u64,
}

impl TaskTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: HashMap::with_capacity(capacity),
            next_id: 0,
        }
    }

    pub(crate) fn insert(&mut self, future: TaskFuture) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(id, future);
        id
    }

    /// Removes the task for polling; `None` means the wakeup was stale.
    pub(crate) fn take(&mut self, id: u64) -> Option<TaskFuture> {
        self.tasks.remove(&id)
    }

    /// Puts a still-pending task back after a poll.
    pub(crate) fn restore(&mut self, id: u64, future: TaskFuture) {
        self.tasks.insert(id, future);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_take_returns_none() {
        let mut table = TaskTable::with_capacity(4);
        let id = table.insert(Box::pin(async {}));
        assert!(table.take(id).is_some());
        assert!(table.take(id).is_none());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut table = TaskTable::with_capacity(4);
        let first = table.insert(Box::pin(async {}));
        table.take(first);
        let second = table.insert(Box::pin(async {}));
        assert_ne!(first, second);
    }

    #[test]
    fn notify_waker_records_single_wake() {
        let queue = Arc::new(ReadyQueue::new());
        let notify = Arc::new(NotifyWaker::new(Arc::clone(&queue)));
        assert!(!notify.take());
        notify.wake_by_ref();
        assert!(notify.take());
        assert!(!notify.take());
        assert_eq!(queue.pop(), Some(NOTIFY_ID));
    }

    #[test]
    fn park_with_pending_wake_returns_immediately() {
        let queue = ReadyQueue::new();
        queue.push(7);
        let before = Instant::now();
        queue.park(Some(before + std::time::Duration::from_secs(5)));
        assert!(before.elapsed() < std::time::Duration::from_secs(1));
    }
}
