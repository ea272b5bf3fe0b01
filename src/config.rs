//! Runtime configuration.
//!
//! This module provides:
//! - The [`RuntimeConfig`] consumed by [`EventLoop`](crate::runtime::EventLoop)
//! - Validation for guardrail invariants
//! - Layered loading (defaults + environment overrides)
//!
//! Environment parsing is intentionally minimal and deterministic.

use crate::observability::LogLevel;
use thiserror::Error;

/// Environment variable controlling the minimum collected log level.
pub const ENV_LOG_LEVEL: &str = "WEFT_LOG_LEVEL";
/// Environment variable controlling the log buffer capacity.
pub const ENV_LOG_CAPACITY: &str = "WEFT_LOG_CAPACITY";

/// Configuration for an event loop instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Minimum severity collected by the runtime's log buffer.
    pub log_level: LogLevel,
    /// Maximum number of retained log entries.
    pub log_capacity: usize,
    /// Initial capacity of the cooperative task table.
    pub task_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_capacity: 1024,
            task_capacity: 64,
        }
    }
}

impl RuntimeConfig {
    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_capacity == 0 {
            return Err(ConfigError::InvalidLogCapacity);
        }
        if self.task_capacity == 0 {
            return Err(ConfigError::InvalidTaskCapacity);
        }
        Ok(())
    }

    /// Applies environment overrides on top of the current values.
    ///
    /// Unset variables leave the corresponding field untouched; malformed
    /// values are reported rather than silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ENV_LOG_LEVEL) {
            config.log_level = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv(ENV_LOG_LEVEL, raw))?;
        }
        if let Ok(raw) = std::env::var(ENV_LOG_CAPACITY) {
            config.log_capacity = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnv(ENV_LOG_CAPACITY, raw))?;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Errors produced by configuration validation and loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The log buffer capacity must be at least one entry.
    #[error("log capacity must be greater than zero")]
    InvalidLogCapacity,
    /// The task table capacity must be at least one slot.
    #[error("task capacity must be greater than zero")]
    InvalidTaskCapacity,
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {0}: {1:?}")]
    InvalidEnv(&'static str, String),
}
