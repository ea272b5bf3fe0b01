//! Log collector for accumulating and filtering log entries.

use super::entry::LogEntry;
use super::level::LogLevel;
use core::fmt;
use std::collections::VecDeque;

/// A collector that accumulates log entries with filtering.
///
/// The collector provides level-based filtering and fixed-capacity ring
/// buffer behavior: once full, the oldest entry is dropped to make room and
/// the drop is counted.
#[derive(Debug, Clone)]
pub struct LogCollector {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    min_level: LogLevel,
    total_received: u64,
    total_dropped: u64,
}

impl LogCollector {
    /// Creates a new log collector with the given capacity.
    ///
    /// A capacity of zero discards everything (but still counts).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            min_level: LogLevel::Trace,
            total_received: 0,
            total_dropped: 0,
        }
    }

    /// Sets the minimum level to collect.
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Returns the configured minimum level.
    #[must_use]
    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Records an entry, applying level filtering and capacity eviction.
    pub fn collect(&mut self, entry: LogEntry) {
        self.total_received += 1;
        if !entry.level.is_enabled_at(self.min_level) {
            return;
        }
        if self.capacity == 0 {
            self.total_dropped += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.total_dropped += 1;
        }
        self.entries.push_back(entry);
    }

    /// Returns the collected entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries received, including filtered and evicted ones.
    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Total entries evicted due to capacity.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Clears all retained entries and counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_received = 0;
        self.total_dropped = 0;
    }

    /// Returns a snapshot of the retained entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl fmt::Display for LogCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(level: LogLevel, message: &str) -> LogEntry {
        LogEntry::new(Duration::ZERO, level, "test", message)
    }

    #[test]
    fn filters_below_min_level() {
        let mut collector = LogCollector::new(16).with_min_level(LogLevel::Info);
        collector.collect(entry(LogLevel::Debug, "dropped"));
        collector.collect(entry(LogLevel::Warn, "kept"));
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.total_received(), 2);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut collector = LogCollector::new(2);
        collector.collect(entry(LogLevel::Info, "a"));
        collector.collect(entry(LogLevel::Info, "b"));
        collector.collect(entry(LogLevel::Info, "c"));
        let messages: Vec<_> = collector.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert_eq!(collector.total_dropped(), 1);
    }

    #[test]
    fn clear_resets_counters() {
        let mut collector = LogCollector::new(4);
        collector.collect(entry(LogLevel::Info, "a"));
        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.total_received(), 0);
    }
}
