//! Structured log entries.

use super::level::LogLevel;
use core::fmt;
use std::time::Duration;

/// A single log entry recorded by the runtime.
///
/// Entries are stamped with the time elapsed since the owning event loop was
/// created, so a log dump reads as a relative timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Time since the event loop started.
    pub elapsed: Duration,
    /// Severity level.
    pub level: LogLevel,
    /// Component that produced the entry (e.g. "runtime", "timer", "task").
    pub target: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(
        elapsed: Duration,
        level: LogLevel,
        target: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            elapsed,
            level,
            target,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>10.6}s] {} {}: {}",
            self.elapsed.as_secs_f64(),
            self.level.as_char(),
            self.target,
            self.message
        )
    }
}
