//! Promise combinators over keyed task collections.
//!
//! This module provides:
//!
//! - [`all`]: every entry must fulfill; first rejection wins
//! - [`all_settled`]: one [`SettlementRecord`](crate::tasks::SettlementRecord)
//!   per entry, never rejects
//! - [`race`]: first settlement wins, fulfilled or rejected
//! - [`any`]: first fulfillment wins; aggregate error when none fulfills
//! - [`timeout`]: race an operation against a deadline
//!
//! # Key ordering
//!
//! `all` and `all_settled` reindex: when every input key is numeric, the
//! result is a dense zero-based run ordered ascending by the original keys,
//! which are discarded. If any key is a string, original keys are preserved
//! and the mapping's insertion order is completion order. The concurrency
//! runners in [`crate::limit`] deliberately use the opposite policy and
//! always keep input keys and input order.
//!
//! # Loser handling
//!
//! Only `race`, `any`, and `timeout` cancel non-winning entries, and only
//! through each entry's root cancellable. `all` and `all_settled` let
//! in-flight siblings run to completion; their outcomes are simply unused.

mod all;
mod race;
mod timeout;

pub use all::{all, all_settled};
pub use race::{any, race};
pub use timeout::timeout;

use crate::promise::Promise;
use crate::tasks::{Keyed, TaskKey};

/// Cancels a branch through its root cancellable, if it has one.
pub(crate) fn cancel_if_possible<T: Clone + Send + 'static>(promise: &Promise<T>) {
    if let Some(token) = promise.root_cancellable() {
        token.cancel();
    }
}

/// Applies the `all`/`all_settled` key policy to completion-ordered results.
pub(crate) fn finalize_keys<V>(mut entries: Vec<(TaskKey, V)>, reindex: bool) -> Keyed<V> {
    if reindex {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(position, (_, value))| (TaskKey::from(position), value))
            .collect();
        return Keyed::from_entries(entries);
    }
    Keyed::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_reindexes_ascending_by_original_key() {
        let entries = vec![
            (TaskKey::Index(5), "five"),
            (TaskKey::Index(2), "two"),
            (TaskKey::Index(9), "nine"),
        ];
        let keyed = finalize_keys(entries, true);
        let keys: Vec<_> = keyed.keys().cloned().collect();
        assert_eq!(keys, vec![TaskKey::Index(0), TaskKey::Index(1), TaskKey::Index(2)]);
        let values: Vec<_> = keyed.into_values();
        assert_eq!(values, vec!["two", "five", "nine"]);
    }

    #[test]
    fn finalize_preserves_keys_and_order_when_not_reindexing() {
        let entries = vec![
            (TaskKey::from("b"), 2),
            (TaskKey::Index(0), 1),
        ];
        let keyed = finalize_keys(entries.clone(), false);
        let round_trip: Vec<_> = keyed.into_iter().collect();
        assert_eq!(round_trip, entries);
    }
}
