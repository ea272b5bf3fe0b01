//! Timer heap for deadline-driven callbacks.
//!
//! A small min-heap of `(deadline, callback)` entries. Each entry gets a
//! monotonic id, which doubles as the tiebreaker so same-deadline timers fire
//! in insertion order, and as the handle for cancellation. Cancellation is
//! lazy: the entry stays in the heap but is skipped when it surfaces.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::time::Instant;

/// Identifies a scheduled timer so it can be cancelled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) type TimerCallback = Box<dyn FnOnce() + Send>;

struct TimerEntry {
    deadline: Instant,
    id: u64,
    callback: TimerCallback,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first); ids are
        // monotonic, so equal deadlines fire in insertion order.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of pending timers ordered by deadline.
#[derive(Default)]
pub(crate) struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    live: HashSet<u64>,
    next_id: u64,
}

impl TimerHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of timers that are still live.
    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Adds a timer firing `callback` at `deadline`.
    pub(crate) fn insert(&mut self, deadline: Instant, callback: TimerCallback) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        self.heap.push(TimerEntry {
            deadline,
            id,
            callback,
        });
        TimerId(id)
    }

    /// Cancels a timer. Returns true if it was still pending.
    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id.0)
    }

    /// The earliest live deadline, pruning cancelled entries off the top.
    pub(crate) fn peek_deadline(&mut self) -> Option<Instant> {
        while let Some(entry) = self.heap.peek() {
            if self.live.contains(&entry.id) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the callbacks of all live timers whose deadline is `<= now`.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Vec<TimerCallback> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                if self.live.remove(&entry.id) {
                    expired.push(entry.callback);
                }
            } else {
                break;
            }
        }
        expired
    }

    /// Drops all timers without firing them.
    pub(crate) fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }
}

impl fmt::Debug for TimerHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHeap")
            .field("live", &self.live.len())
            .field("queued", &self.heap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use std::time::Duration;

    fn noop() -> TimerCallback {
        Box::new(|| {})
    }

    #[test]
    fn empty_heap_has_no_deadline() {
        let mut heap = TimerHeap::new();
        assert!(heap.is_empty());
        assert_eq!(heap.peek_deadline(), None);
    }

    #[test]
    fn peek_returns_earliest_deadline() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        heap.insert(base + Duration::from_millis(200), noop());
        heap.insert(base + Duration::from_millis(100), noop());
        heap.insert(base + Duration::from_millis(150), noop());
        assert_eq!(heap.peek_deadline(), Some(base + Duration::from_millis(100)));
    }

    #[test]
    fn pop_expired_fires_due_timers_only() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for offset in [50_u64, 100, 200] {
            let fired = Arc::clone(&fired);
            heap.insert(
                base + Duration::from_millis(offset),
                Box::new(move || {
                    fired.fetch_add(1, AtomicOrdering::SeqCst);
                }),
            );
        }

        let due = heap.pop_expired(base + Duration::from_millis(125));
        assert_eq!(due.len(), 2);
        for callback in due {
            callback();
        }
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.peek_deadline(), Some(base + Duration::from_millis(200)));
    }

    #[test]
    fn same_deadline_pops_in_insertion_order() {
        let deadline = Instant::now();
        let mut heap = TimerHeap::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in [1, 2, 3] {
            let order = Arc::clone(&order);
            heap.insert(
                deadline,
                Box::new(move || {
                    order.lock().push(tag);
                }),
            );
        }

        for callback in heap.pop_expired(deadline) {
            callback();
        }
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_timer_does_not_fire() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let id = heap.insert(
            base,
            Box::new(move || {
                f.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );

        assert!(heap.cancel(id));
        assert!(!heap.cancel(id));
        assert!(heap.is_empty());

        for callback in heap.pop_expired(base + Duration::from_millis(1)) {
            callback();
        }
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn cancelled_entry_is_pruned_from_peek() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        let early = heap.insert(base + Duration::from_millis(10), noop());
        heap.insert(base + Duration::from_millis(500), noop());

        heap.cancel(early);
        assert_eq!(heap.peek_deadline(), Some(base + Duration::from_millis(500)));
    }

    #[test]
    fn pop_expired_includes_exact_deadline() {
        let deadline = Instant::now();
        let mut heap = TimerHeap::new();
        heap.insert(deadline, noop());
        assert_eq!(heap.pop_expired(deadline).len(), 1);
        assert!(heap.is_empty());
    }

    #[test]
    fn clear_empties_heap() {
        let base = Instant::now();
        let mut heap = TimerHeap::new();
        heap.insert(base, noop());
        heap.insert(base + Duration::from_millis(100), noop());
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.peek_deadline(), None);
    }
}
