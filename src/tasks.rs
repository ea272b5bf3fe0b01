//! Keyed task collections and settlement records.
//!
//! Combinators and the bounded-concurrency runners consume a [`TaskList`]: an
//! order-preserving mapping from [`TaskKey`] (integer or string) to a
//! [`TaskEntry`]. An entry is a closed tagged union over the three shapes a
//! caller can hand in: an already-computed value, a promise in flight, or a
//! zero-argument factory that produces a promise when the operation decides to
//! start it. Normalization happens exactly once, at the point an operation
//! launches the entry; the type system discharges the "neither a promise nor a
//! promise-producing callable" error case entirely.

use crate::error::Reason;
use crate::promise::{CancellablePromise, Promise};
use core::fmt;

/// Key identifying an entry in a [`TaskList`] and in result mappings.
///
/// Integer keys may be non-sequential and need not start at zero; string keys
/// mark a collection as named, which changes the key-ordering policy of
/// `all`/`all_settled` (see [`crate::combinator`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKey {
    /// A numeric key.
    Index(i64),
    /// A string key.
    Name(String),
}

impl TaskKey {
    /// Returns true if this is a numeric key.
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Returns true if this is a string key.
    #[must_use]
    pub fn is_name(&self) -> bool {
        matches!(self, Self::Name(_))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskKey {
    fn from(i: i64) -> Self {
        Self::Index(i)
    }
}

impl From<usize> for TaskKey {
    fn from(i: usize) -> Self {
        // Saturates instead of wrapping for indices beyond i64's range.
        Self::Index(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<&str> for TaskKey {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for TaskKey {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

/// One entry of a [`TaskList`].
pub enum TaskEntry<T> {
    /// A value that is already available.
    Ready(T),
    /// A promise already in flight.
    Promise(Promise<T>),
    /// A factory invoked when the consuming operation launches this entry.
    Factory(Box<dyn FnOnce() -> Promise<T> + Send>),
}

impl<T> TaskEntry<T> {
    /// Wraps a factory closure.
    pub fn factory(f: impl FnOnce() -> Promise<T> + Send + 'static) -> Self {
        Self::Factory(Box::new(f))
    }
}

impl<T: Clone + Send + 'static> TaskEntry<T> {
    /// Normalizes the entry into a promise, invoking a factory if needed.
    pub(crate) fn into_promise(self) -> Promise<T> {
        match self {
            Self::Ready(value) => Promise::fulfilled(value),
            Self::Promise(promise) => promise,
            Self::Factory(f) => f(),
        }
    }
}

impl<T> fmt::Debug for TaskEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("TaskEntry::Ready"),
            Self::Promise(_) => f.write_str("TaskEntry::Promise"),
            Self::Factory(_) => f.write_str("TaskEntry::Factory"),
        }
    }
}

impl<T> From<Promise<T>> for TaskEntry<T> {
    fn from(p: Promise<T>) -> Self {
        Self::Promise(p)
    }
}

impl<T> From<CancellablePromise<T>> for TaskEntry<T> {
    fn from(p: CancellablePromise<T>) -> Self {
        // The inner promise carries the cancel token as its root, so loser
        // cancellation still reaches the source.
        Self::Promise(p.into_promise())
    }
}

/// An order-preserving key → entry collection consumed by combinators and
/// concurrency runners.
#[derive(Debug, Default)]
pub struct TaskList<T> {
    entries: Vec<(TaskKey, TaskEntry<T>)>,
}

impl<T> TaskList<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry under the next free numeric key.
    ///
    /// The next free key is one past the largest numeric key present, or zero
    /// for a collection without numeric keys.
    pub fn push(&mut self, entry: impl Into<TaskEntry<T>>) {
        let next = self
            .entries
            .iter()
            .filter_map(|(k, _)| match k {
                TaskKey::Index(i) => Some(*i),
                TaskKey::Name(_) => None,
            })
            .max()
            .map_or(0, |i| i + 1);
        self.entries.push((TaskKey::Index(next), entry.into()));
    }

    /// Appends an entry under an explicit key.
    pub fn insert(&mut self, key: impl Into<TaskKey>, entry: impl Into<TaskEntry<T>>) {
        self.entries.push((key.into(), entry.into()));
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the collection has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any key is a string key.
    #[must_use]
    pub fn has_name_keys(&self) -> bool {
        self.entries.iter().any(|(k, _)| k.is_name())
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub(crate) fn from_entries(entries: Vec<(TaskKey, TaskEntry<T>)>) -> Self {
        Self { entries }
    }

    pub(crate) fn into_entries(self) -> Vec<(TaskKey, TaskEntry<T>)> {
        self.entries
    }
}

impl<T> From<Vec<Promise<T>>> for TaskList<T> {
    fn from(promises: Vec<Promise<T>>) -> Self {
        promises.into_iter().collect()
    }
}

impl<T, E: Into<TaskEntry<T>>> FromIterator<E> for TaskList<T> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut list = Self::new();
        for entry in iter {
            list.push(entry.into());
        }
        list
    }
}

/// An order-preserving key → value result mapping.
///
/// For key-preserving operations, insertion order is completion order; for
/// reindexed results the keys are the dense run `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<V> {
    entries: Vec<(TaskKey, V)>,
}

impl<V> Keyed<V> {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_entries(entries: Vec<(TaskKey, V)>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &TaskKey) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a value by numeric key.
    #[must_use]
    pub fn get_index(&self, index: i64) -> Option<&V> {
        self.get(&TaskKey::Index(index))
    }

    /// Looks up a value by string key.
    #[must_use]
    pub fn get_name(&self, name: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, TaskKey::Name(n) if n == name))
            .map(|(_, v)| v)
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterates over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Consumes the mapping, returning values in insertion order.
    #[must_use]
    pub fn into_values(self) -> Vec<V> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }

    pub(crate) fn extend_entries(&mut self, other: Keyed<V>) {
        self.entries.extend(other.entries);
    }
}

impl<V> Default for Keyed<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntoIterator for Keyed<V> {
    type Item = (TaskKey, V);
    type IntoIter = std::vec::IntoIter<(TaskKey, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The settlement of a single entry, as produced by `all_settled` and
/// `concurrent_settled`.
#[derive(Debug, Clone)]
pub enum SettlementRecord<T> {
    /// The entry fulfilled with a value.
    Fulfilled(T),
    /// The entry rejected with a reason.
    Rejected(Reason),
}

impl<T> SettlementRecord<T> {
    /// Returns true if the entry fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns true if the entry rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The fulfillment value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(r) => Some(r),
        }
    }
}

impl<T> From<Result<T, Reason>> for SettlementRecord<T> {
    fn from(outcome: Result<T, Reason>) -> Self {
        match outcome {
            Ok(v) => Self::Fulfilled(v),
            Err(r) => Self::Rejected(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_indices() {
        let mut list: TaskList<i32> = TaskList::new();
        list.push(Promise::fulfilled(1));
        list.push(Promise::fulfilled(2));
        let keys: Vec<_> = list.keys().cloned().collect();
        assert_eq!(keys, vec![TaskKey::Index(0), TaskKey::Index(1)]);
    }

    #[test]
    fn push_continues_after_explicit_index() {
        let mut list: TaskList<i32> = TaskList::new();
        list.insert(5_i64, Promise::fulfilled(1));
        list.push(Promise::fulfilled(2));
        let keys: Vec<_> = list.keys().cloned().collect();
        assert_eq!(keys, vec![TaskKey::Index(5), TaskKey::Index(6)]);
    }

    #[test]
    fn name_keys_are_detected() {
        let mut list: TaskList<i32> = TaskList::new();
        list.insert(0_i64, Promise::fulfilled(1));
        assert!(!list.has_name_keys());
        list.insert("late", Promise::fulfilled(2));
        assert!(list.has_name_keys());
    }

    #[test]
    fn usize_keys_convert_without_wrapping() {
        assert_eq!(TaskKey::from(3_usize), TaskKey::Index(3));
        assert_eq!(TaskKey::from(usize::MAX), TaskKey::Index(i64::MAX));
    }

    #[test]
    fn entry_from_cancellable_keeps_the_root_token() {
        let (cancellable, _settler) = CancellablePromise::<i32>::pending();
        let promise = TaskEntry::from(cancellable.clone()).into_promise();

        let root = promise.root_cancellable().expect("root token");
        root.cancel();
        assert!(cancellable.is_cancelled());
        assert!(promise.is_rejected());
    }

    #[test]
    fn keyed_lookup_by_index_and_name() {
        let keyed = Keyed::from_entries(vec![
            (TaskKey::Index(7), "seven"),
            (TaskKey::Name("x".into()), "ex"),
        ]);
        assert_eq!(keyed.get_index(7), Some(&"seven"));
        assert_eq!(keyed.get_name("x"), Some(&"ex"));
        assert_eq!(keyed.get_index(0), None);
    }
}
