//! Logging severity levels.

use core::fmt;
use std::str::FromStr;

/// Severity level for log entries.
///
/// Levels are ordered: Trace < Debug < Info < Warn < Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Detailed tracing information (lowest priority).
    Trace,
    /// Debugging information.
    Debug,
    /// General informational messages (default).
    Info,
    /// Warning conditions that are not errors.
    Warn,
    /// Error conditions (highest priority).
    Error,
}

impl LogLevel {
    /// Returns true if an event at this level passes the given threshold.
    #[must_use]
    pub const fn is_enabled_at(&self, threshold: Self) -> bool {
        (*self as u8) >= (threshold as u8)
    }

    /// Returns a single-character representation (T, D, I, W, E).
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::Trace => 'T',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
        }
    }

    /// Returns the string representation in lowercase.
    #[must_use]
    pub const fn as_str_lower(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_lower())
    }
}

/// Error returned when parsing a [`LogLevel`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {:?}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
