//! The `race` and `any` combinators.

use super::cancel_if_possible;
use crate::error::{AggregateError, Reason};
use crate::promise::Promise;
use crate::tasks::{TaskKey, TaskList};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Settles with the first entry to settle, fulfilled or rejected.
///
/// Every non-winning entry is cancelled through its root cancellable, if it
/// has one. An empty input rejects immediately, since nothing could ever
/// settle the result.
#[must_use]
pub fn race<T: Clone + Send + 'static>(tasks: TaskList<T>) -> Promise<T> {
    let entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::rejected(Reason::Invalid(
            "cannot race an empty collection".to_string(),
        ));
    }

    let (promise, settler) = Promise::pending();
    let branches: Arc<Vec<Promise<T>>> = Arc::new(
        entries
            .into_iter()
            .map(|(_, entry)| entry.into_promise())
            .collect(),
    );
    let won = Arc::new(AtomicBool::new(false));

    for position in 0..branches.len() {
        let branch = branches[position].clone();
        let settler = settler.clone();
        let won = Arc::clone(&won);
        let branches = Arc::clone(&branches);
        branch.on_settled(move |outcome| {
            if won.swap(true, Ordering::AcqRel) {
                return;
            }
            settler.settle_outcome(outcome);
            for (loser, branch) in branches.iter().enumerate() {
                if loser != position {
                    cancel_if_possible(branch);
                }
            }
        });
    }
    promise
}

/// Resolves with the first entry to fulfill.
///
/// Rejections are tolerated until every entry has rejected, at which point
/// the result rejects with an [`AggregateError`] holding each reason, keyed
/// like the input and in input order. On success, every non-winning entry is
/// cancelled through its root cancellable. An empty input rejects with the
/// empty aggregate.
#[must_use]
pub fn any<T: Clone + Send + 'static>(tasks: TaskList<T>) -> Promise<T> {
    let entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::rejected(Reason::Aggregate(AggregateError::empty()));
    }

    let total = entries.len();
    let (promise, settler) = Promise::pending();
    let mut keys = Vec::with_capacity(total);
    let mut branch_list = Vec::with_capacity(total);
    for (key, entry) in entries {
        keys.push(key);
        branch_list.push(entry.into_promise());
    }
    let keys: Arc<Vec<TaskKey>> = Arc::new(keys);
    let branches: Arc<Vec<Promise<T>>> = Arc::new(branch_list);
    let reasons: Arc<Mutex<Vec<Option<Reason>>>> = Arc::new(Mutex::new(vec![None; total]));
    let won = Arc::new(AtomicBool::new(false));

    for position in 0..total {
        let branch = branches[position].clone();
        let settler = settler.clone();
        let won = Arc::clone(&won);
        let keys = Arc::clone(&keys);
        let branches = Arc::clone(&branches);
        let reasons = Arc::clone(&reasons);
        branch.on_settled(move |outcome| match outcome {
            Ok(value) => {
                if won.swap(true, Ordering::AcqRel) {
                    return;
                }
                settler.resolve(value);
                for (loser, branch) in branches.iter().enumerate() {
                    if loser != position {
                        cancel_if_possible(branch);
                    }
                }
            }
            Err(reason) => {
                let all_rejected = {
                    let mut reasons = reasons.lock();
                    reasons[position] = Some(reason);
                    reasons.iter().all(Option::is_some)
                };
                if all_rejected && !won.swap(true, Ordering::AcqRel) {
                    let collected = std::mem::take(&mut *reasons.lock());
                    let keyed = keys
                        .iter()
                        .cloned()
                        .zip(collected)
                        .filter_map(|(key, slot)| slot.map(|reason| (key, reason)))
                        .collect();
                    settler.reject(Reason::Aggregate(AggregateError::new(keyed)));
                }
            }
        });
    }
    promise
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::CancellablePromise;

    #[test]
    fn race_takes_first_settlement() {
        let (slow, _slow_settler) = Promise::pending();
        let (fast, fast_settler) = Promise::pending();
        let mut tasks = TaskList::new();
        tasks.push(slow);
        tasks.push(fast);
        let result = race(tasks);

        fast_settler.resolve(9);
        assert_eq!(result.try_outcome(), Some(Ok(9)));
    }

    #[test]
    fn race_propagates_a_winning_rejection() {
        let (slow, _slow_settler) = Promise::<i32>::pending();
        let mut tasks = TaskList::new();
        tasks.push(slow);
        tasks.push(Promise::rejected(Reason::from("lost early")));
        let result = race(tasks);
        assert!(matches!(
            result.try_outcome(),
            Some(Err(Reason::Message(m))) if m == "lost early"
        ));
    }

    #[test]
    fn race_cancels_cancellable_losers() {
        let loser = CancellablePromise::<i32>::new(|_| Ok(()));
        let (fast, fast_settler) = Promise::pending();
        let mut tasks = TaskList::new();
        tasks.push(loser.clone());
        tasks.push(fast);
        let result = race(tasks);

        fast_settler.resolve(1);
        assert_eq!(result.try_outcome(), Some(Ok(1)));
        assert!(loser.is_cancelled());
        assert!(loser.is_rejected());
    }

    #[test]
    fn race_cancels_losers_when_a_rejection_wins() {
        let loser = CancellablePromise::<i32>::new(|_| Ok(()));
        let mut tasks = TaskList::new();
        tasks.push(loser.clone());
        tasks.push(Promise::rejected(Reason::from("lost early")));
        let result = race(tasks);

        assert!(result.is_rejected());
        assert!(loser.is_cancelled());
    }

    #[test]
    fn race_of_empty_input_rejects() {
        let result = race(TaskList::<i32>::new());
        assert!(matches!(result.try_outcome(), Some(Err(Reason::Invalid(_)))));
    }

    #[test]
    fn any_resolves_with_first_fulfillment_despite_rejections() {
        let (pending, settler) = Promise::pending();
        let mut tasks = TaskList::new();
        tasks.push(Promise::<i32>::rejected(Reason::from("a")));
        tasks.push(pending);
        let result = any(tasks);

        assert!(result.is_pending());
        settler.resolve(3);
        assert_eq!(result.try_outcome(), Some(Ok(3)));
    }

    #[test]
    fn any_aggregates_all_rejections_in_input_order() {
        let (second, second_settler) = Promise::<i32>::pending();
        let mut tasks = TaskList::new();
        tasks.insert("first", Promise::<i32>::rejected(Reason::from("e1")));
        tasks.insert("second", second);
        let result = any(tasks);

        second_settler.reject(Reason::from("e2"));
        let Some(Err(Reason::Aggregate(aggregate))) = result.try_outcome() else {
            panic!("expected aggregate rejection");
        };
        let reasons: Vec<_> = aggregate
            .reasons()
            .iter()
            .map(|(key, reason)| (key.to_string(), reason.to_string()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("first".to_string(), "e1".to_string()),
                ("second".to_string(), "e2".to_string()),
            ]
        );
    }

    #[test]
    fn any_of_empty_input_rejects_with_empty_aggregate() {
        let result = any(TaskList::<i32>::new());
        let Some(Err(Reason::Aggregate(aggregate))) = result.try_outcome() else {
            panic!("expected aggregate rejection");
        };
        assert!(aggregate.is_empty());
        assert_eq!(aggregate.to_string(), "no promises provided");
    }

    #[test]
    fn any_cancels_losers_on_success_only() {
        let loser = CancellablePromise::<i32>::new(|_| Ok(()));
        let mut tasks = TaskList::new();
        tasks.push(loser.clone());
        tasks.push(Promise::fulfilled(1));
        let result = any(tasks);

        assert_eq!(result.try_outcome(), Some(Ok(1)));
        assert!(loser.is_cancelled());
    }
}
