//! Weft: a cooperative promise runtime with cancellation, combinators, and
//! bounded concurrency.
//!
//! # Overview
//!
//! Weft models eventual values as settle-once promises driven by an explicit,
//! single-threaded event loop. There is no ambient global runtime: callers
//! construct an [`EventLoop`], spawn cooperative tasks on it, and either
//! `.await` promises inside those tasks or block on them from the outside
//! through the loop's one blocking entry point.
//!
//! # Core Guarantees
//!
//! - **Settle-once**: a promise transitions exactly once from pending to
//!   fulfilled or rejected; reactions fire in registration order, late
//!   registrations fire immediately
//! - **Cancellation reaches the source**: derived promises carry their root
//!   cancellable, so cancelling a `.then()` chain tears down the original
//!   timer or operation
//! - **Single blocking path**: only [`Promise::wait`] and
//!   [`EventLoop::block_on`] block the thread; inside a cooperative task,
//!   suspension is always waker-based
//! - **Deterministic teardown**: loops are explicit values with a `reset`,
//!   so independent runtimes coexist and tests isolate cleanly
//!
//! # Module Structure
//!
//! - [`promise`]: the settlement state machine and the cancellation layer
//! - [`runtime`]: the event loop, task table, and timer heap
//! - [`combinator`]: `all`, `all_settled`, `race`, `any`, `timeout`
//! - [`limit`]: bounded-concurrency runners (`concurrent`, `batch`)
//! - [`sync`]: the promise-based FIFO mutex
//! - [`time`](mod@time): timer-backed `delay` and `sleep`
//! - [`tasks`]: keyed task collections consumed by combinators and runners
//! - [`error`](mod@error): rejection reasons and the aggregate error
//! - [`config`]: runtime configuration with environment overrides
//! - [`observability`]: the runtime's structured log buffer

#![deny(unsafe_code)]

pub mod combinator;
pub mod config;
pub mod error;
pub mod limit;
pub mod observability;
pub mod promise;
pub mod runtime;
pub mod sync;
pub mod tasks;
pub mod time;

pub use combinator::{all, all_settled, any, race, timeout};
pub use config::{ConfigError, RuntimeConfig};
pub use error::{AggregateError, Reason};
pub use limit::{batch, concurrent, concurrent_settled};
pub use observability::{LogCollector, LogEntry, LogLevel};
pub use promise::{CancelToken, CancellablePromise, Promise, Resolution, Settler};
pub use runtime::{EventLoop, Handle, TimerId};
pub use sync::{LockHandle, Mutex};
pub use tasks::{Keyed, SettlementRecord, TaskEntry, TaskKey, TaskList};
pub use time::{delay, sleep};
