//! Structured logging for the runtime.
//!
//! The event loop owns a [`LogCollector`] and records task, timer, and
//! settlement events into it as it drives work. Collection is in-memory and
//! capacity-bounded; callers inspect entries through
//! [`Handle::log_snapshot`](crate::runtime::Handle::log_snapshot) rather
//! than through a process-wide logger.

pub mod collector;
pub mod entry;
pub mod level;

pub use collector::LogCollector;
pub use entry::LogEntry;
pub use level::LogLevel;
