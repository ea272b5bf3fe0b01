//! Bounded-concurrency task runners.
//!
//! This module provides:
//!
//! - [`concurrent`]: run a collection with at most `limit` in flight,
//!   fail-fast on the first rejection
//! - [`concurrent_settled`]: same scheduling, but every entry gets a
//!   [`SettlementRecord`] and the result never rejects
//! - [`batch`]: sequential chunks, each run through [`concurrent`]
//!
//! Unlike the combinators in [`crate::combinator`], the runners launch
//! entries lazily: a factory entry is only invoked when the scheduler has a
//! free slot for it, in input order. Result mappings always keep the input
//! keys verbatim and the input order, regardless of completion order.

use crate::error::Reason;
use crate::promise::{Promise, Settler};
use crate::tasks::{Keyed, SettlementRecord, TaskEntry, TaskKey, TaskList};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct RunnerState<T, R> {
    queue: VecDeque<(usize, TaskKey, TaskEntry<T>)>,
    slots: Vec<Option<(TaskKey, R)>>,
    completed: usize,
    in_flight: usize,
    pumping: bool,
}

struct RunnerCtx<T, R, F> {
    state: Mutex<RunnerState<T, R>>,
    settler: Settler<Keyed<R>>,
    limit: usize,
    total: usize,
    record: F,
}

/// Shared driver for both runner flavors. `record` turns a branch settlement
/// into either a result slot or an overall rejection.
fn run_limited<T, R, F>(tasks: TaskList<T>, limit: usize, record: F) -> Promise<Keyed<R>>
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    F: Fn(Result<T, Reason>) -> Result<R, Reason> + Send + Sync + 'static,
{
    assert!(limit > 0, "concurrency limit must be greater than zero");

    let entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::fulfilled(Keyed::new());
    }

    let total = entries.len();
    let (promise, settler) = Promise::pending();
    let queue = entries
        .into_iter()
        .enumerate()
        .map(|(position, (key, entry))| (position, key, entry))
        .collect();
    let ctx = Arc::new(RunnerCtx {
        state: Mutex::new(RunnerState {
            queue,
            slots: (0..total).map(|_| None).collect(),
            completed: 0,
            in_flight: 0,
            pumping: false,
        }),
        settler,
        limit,
        total,
        record,
    });
    pump(&ctx);
    promise
}

/// Launches queued entries while a slot is free. Iterative: a branch that
/// settles synchronously re-enters through its reaction, sees the `pumping`
/// flag, and bails out, leaving the outer loop to continue.
fn pump<T, R, F>(ctx: &Arc<RunnerCtx<T, R, F>>)
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    F: Fn(Result<T, Reason>) -> Result<R, Reason> + Send + Sync + 'static,
{
    {
        let mut state = ctx.state.lock();
        if state.pumping {
            return;
        }
        state.pumping = true;
    }
    loop {
        let next = {
            let mut state = ctx.state.lock();
            if ctx.settler.is_settled() || state.in_flight >= ctx.limit {
                state.pumping = false;
                return;
            }
            match state.queue.pop_front() {
                Some(item) => {
                    state.in_flight += 1;
                    item
                }
                None => {
                    state.pumping = false;
                    return;
                }
            }
        };
        launch(ctx, next);
    }
}

fn launch<T, R, F>(ctx: &Arc<RunnerCtx<T, R, F>>, (position, key, entry): (usize, TaskKey, TaskEntry<T>))
where
    T: Clone + Send + 'static,
    R: Clone + Send + 'static,
    F: Fn(Result<T, Reason>) -> Result<R, Reason> + Send + Sync + 'static,
{
    let branch = entry.into_promise();
    let ctx = Arc::clone(ctx);
    branch.on_settled(move |outcome| {
        match (ctx.record)(outcome) {
            Ok(result) => {
                let complete = {
                    let mut state = ctx.state.lock();
                    state.in_flight -= 1;
                    state.slots[position] = Some((key, result));
                    state.completed += 1;
                    state.completed == ctx.total
                };
                if complete {
                    let slots = std::mem::take(&mut ctx.state.lock().slots);
                    let results = slots.into_iter().flatten().collect();
                    ctx.settler.resolve(Keyed::from_entries(results));
                    return;
                }
            }
            Err(reason) => {
                ctx.state.lock().in_flight -= 1;
                // First rejection wins; in-flight branches run on with their
                // outcomes discarded, and nothing new is launched.
                ctx.settler.reject(reason);
                return;
            }
        }
        pump(&ctx);
    });
}

/// Runs the collection with at most `limit` entries in flight.
///
/// Entries launch in input order as slots free up. The result maps each
/// input key to its value, in input order. The first rejection anywhere
/// rejects the result immediately: branches already in flight continue but
/// their outcomes are discarded, and queued entries are never launched.
///
/// # Panics
///
/// Panics if `limit` is zero.
#[must_use]
pub fn concurrent<T: Clone + Send + 'static>(tasks: TaskList<T>, limit: usize) -> Promise<Keyed<T>> {
    run_limited(tasks, limit, |outcome| outcome)
}

/// Runs the collection like [`concurrent`] but never rejects: every entry
/// produces a [`SettlementRecord`], and the result resolves once each entry
/// has one.
///
/// # Panics
///
/// Panics if `limit` is zero.
#[must_use]
pub fn concurrent_settled<T: Clone + Send + 'static>(
    tasks: TaskList<T>,
    limit: usize,
) -> Promise<Keyed<SettlementRecord<T>>> {
    run_limited(tasks, limit, |outcome| Ok(SettlementRecord::from(outcome)))
}

/// Partitions the collection into sequential chunks of `batch_size` and runs
/// each through [`concurrent`] with the given limit. A chunk starts only
/// after the previous chunk's promise settles; the first rejected chunk
/// rejects the result and stops the sequence. Results are merged in input
/// order with keys preserved.
///
/// # Panics
///
/// Panics if `batch_size` or `limit` is zero.
#[must_use]
pub fn batch<T: Clone + Send + 'static>(
    tasks: TaskList<T>,
    batch_size: usize,
    limit: usize,
) -> Promise<Keyed<T>> {
    assert!(batch_size > 0, "batch size must be greater than zero");
    assert!(limit > 0, "concurrency limit must be greater than zero");

    let mut entries = tasks.into_entries();
    if entries.is_empty() {
        return Promise::fulfilled(Keyed::new());
    }

    let mut chunks = VecDeque::new();
    while !entries.is_empty() {
        let rest = entries.split_off(entries.len().min(batch_size));
        chunks.push_back(TaskList::from_entries(entries));
        entries = rest;
    }

    let (promise, settler) = Promise::pending();
    run_chunk(chunks, limit, Keyed::new(), settler);
    promise
}

fn run_chunk<T: Clone + Send + 'static>(
    mut chunks: VecDeque<TaskList<T>>,
    limit: usize,
    mut merged: Keyed<T>,
    settler: Settler<Keyed<T>>,
) {
    let Some(chunk) = chunks.pop_front() else {
        settler.resolve(merged);
        return;
    };
    concurrent(chunk, limit).on_settled(move |outcome| match outcome {
        Ok(results) => {
            merged.extend_entries(results);
            run_chunk(chunks, limit, merged, settler);
        }
        Err(reason) => settler.reject(reason),
    });
}
