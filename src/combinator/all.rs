//! The `all` and `all_settled` combinators.

use super::finalize_keys;
use crate::promise::Promise;
use crate::tasks::{Keyed, SettlementRecord, TaskKey, TaskList};
use parking_lot::Mutex;
use std::sync::Arc;

/// Resolves with every entry's value once all of them fulfill.
///
/// The first rejection rejects the result immediately with that reason;
/// siblings still in flight are not cancelled and their outcomes are
/// discarded. An empty input resolves with an empty mapping. Factories are
/// invoked up front, so every entry starts before the first settlement is
/// observed.
#[must_use]
pub fn all<T: Clone + Send + 'static>(tasks: TaskList<T>) -> Promise<Keyed<T>> {
    let reindex = !tasks.has_name_keys();
    let entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::fulfilled(Keyed::new());
    }

    let total = entries.len();
    let (promise, settler) = Promise::pending();
    let fulfilled: Arc<Mutex<Vec<(TaskKey, T)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));

    for (key, entry) in entries {
        let branch = entry.into_promise();
        let fulfilled = Arc::clone(&fulfilled);
        let settler = settler.clone();
        branch.on_settled(move |outcome| match outcome {
            Ok(value) => {
                let complete = {
                    let mut fulfilled = fulfilled.lock();
                    fulfilled.push((key, value));
                    fulfilled.len() == total
                };
                if complete {
                    let results = std::mem::take(&mut *fulfilled.lock());
                    settler.resolve(finalize_keys(results, reindex));
                }
            }
            Err(reason) => settler.reject(reason),
        });
    }
    promise
}

/// Resolves with one [`SettlementRecord`] per entry once every entry has
/// settled. Never rejects.
#[must_use]
pub fn all_settled<T: Clone + Send + 'static>(
    tasks: TaskList<T>,
) -> Promise<Keyed<SettlementRecord<T>>> {
    let reindex = !tasks.has_name_keys();
    let entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::fulfilled(Keyed::new());
    }

    let total = entries.len();
    let (promise, settler) = Promise::pending();
    let records: Arc<Mutex<Vec<(TaskKey, SettlementRecord<T>)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(total)));

    for (key, entry) in entries {
        let branch = entry.into_promise();
        let records = Arc::clone(&records);
        let settler = settler.clone();
        branch.on_settled(move |outcome| {
            let complete = {
                let mut records = records.lock();
                records.push((key, SettlementRecord::from(outcome)));
                records.len() == total
            };
            if complete {
                let results = std::mem::take(&mut *records.lock());
                settler.resolve(finalize_keys(results, reindex));
            }
        });
    }
    promise
}
