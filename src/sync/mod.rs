//! Promise-based synchronization primitives.

mod mutex;

pub use mutex::{LockHandle, Mutex};
