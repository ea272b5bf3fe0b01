//! Rejection reasons and error handling strategy.
//!
//! Error handling follows these principles:
//!
//! - Rejection reasons are explicit and typed, but may carry an opaque
//!   non-error payload, since a promise may be rejected with any value
//! - Precondition violations (bad arguments) panic synchronously at the call
//!   site rather than rejecting the returned promise
//! - All other failures propagate exclusively through promise rejection and
//!   are observed via `catch`, `wait`, or settlement inspection
//!
//! There is no process-wide unhandled-rejection reporting: a rejection nobody
//! observes is the caller's responsibility.

use crate::tasks::TaskKey;
use core::fmt;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// The reason a promise rejected.
///
/// Cloneable so that a single settlement can fan out to many reactions.
/// The [`Opaque`](Reason::Opaque) variant holds a non-error rejection value;
/// its `Display` form is the defined stringification used when re-raising.
#[derive(Clone, Error)]
pub enum Reason {
    /// A plain diagnostic message.
    #[error("{0}")]
    Message(String),
    /// The promise was cancelled while pending.
    #[error("promise cancelled")]
    Cancelled,
    /// A deadline elapsed before the raced operation settled.
    #[error("operation timed out after {seconds} seconds")]
    Timeout {
        /// The configured timeout duration, in seconds.
        seconds: f64,
    },
    /// Every branch of an `any` rejected.
    #[error(transparent)]
    Aggregate(AggregateError),
    /// The input collection was unusable (e.g. racing an empty collection).
    #[error("{0}")]
    Invalid(String),
    /// A non-error rejection value.
    #[error("promise rejected with non-error value of type {type_name}")]
    Opaque {
        /// Type name of the payload, captured at construction.
        type_name: &'static str,
        /// The payload itself, downcastable via [`Reason::downcast_opaque`].
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl Reason {
    /// Creates a message reason.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Creates a timeout reason carrying the configured duration.
    #[must_use]
    pub fn timeout(seconds: f64) -> Self {
        Self::Timeout { seconds }
    }

    /// Wraps an arbitrary non-error value as a rejection reason.
    pub fn opaque<V: Any + Send + Sync>(value: V) -> Self {
        Self::Opaque {
            type_name: std::any::type_name::<V>(),
            value: Arc::new(value),
        }
    }

    /// Returns true for [`Reason::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true for [`Reason::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The aggregate error, if this reason is one.
    #[must_use]
    pub fn as_aggregate(&self) -> Option<&AggregateError> {
        match self {
            Self::Aggregate(e) => Some(e),
            _ => None,
        }
    }

    /// Attempts to view an opaque payload as a concrete type.
    #[must_use]
    pub fn downcast_opaque<V: Any>(&self) -> Option<&V> {
        match self {
            Self::Opaque { value, .. } => value.downcast_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Timeout { seconds } => {
                f.debug_struct("Timeout").field("seconds", seconds).finish()
            }
            Self::Aggregate(e) => f.debug_tuple("Aggregate").field(e).finish(),
            Self::Invalid(m) => f.debug_tuple("Invalid").field(m).finish(),
            Self::Opaque { type_name, .. } => {
                f.debug_struct("Opaque").field("type_name", type_name).finish()
            }
        }
    }
}

impl PartialEq for Reason {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Message(a), Self::Message(b)) | (Self::Invalid(a), Self::Invalid(b)) => a == b,
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Timeout { seconds: a }, Self::Timeout { seconds: b }) => a == b,
            (Self::Aggregate(a), Self::Aggregate(b)) => a == b,
            // Opaque payloads compare by identity.
            (Self::Opaque { value: a, .. }, Self::Opaque { value: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        Self::Message(s.to_string())
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Self::Message(s)
    }
}

/// Aggregate of every branch rejection, produced by `any` when no branch
/// fulfills.
///
/// Reasons are keyed like the input collection and ordered by input position,
/// regardless of the order in which the branches rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateError {
    reasons: Vec<(TaskKey, Reason)>,
}

impl AggregateError {
    /// Builds an aggregate from keyed reasons in input order.
    #[must_use]
    pub fn new(reasons: Vec<(TaskKey, Reason)>) -> Self {
        Self { reasons }
    }

    /// The aggregate produced for an empty input collection.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The keyed rejection reasons, in input order.
    #[must_use]
    pub fn reasons(&self) -> &[(TaskKey, Reason)] {
        &self.reasons
    }

    /// Number of collected reasons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Returns true for the empty-input aggregate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reasons.is_empty() {
            f.write_str("no promises provided")
        } else {
            write!(
                f,
                "all promises were rejected ({} reasons)",
                self.reasons.len()
            )
        }
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_carries_duration() {
        let reason = Reason::timeout(0.05);
        assert_eq!(reason.to_string(), "operation timed out after 0.05 seconds");
        assert!(reason.is_timeout());
    }

    #[test]
    fn opaque_downcasts_to_original_type() {
        let reason = Reason::opaque(42_u32);
        assert_eq!(reason.downcast_opaque::<u32>(), Some(&42));
        assert_eq!(reason.downcast_opaque::<i64>(), None);
        assert!(reason.to_string().contains("non-error value"));
    }

    #[test]
    fn aggregate_display_distinguishes_empty() {
        assert_eq!(AggregateError::empty().to_string(), "no promises provided");
        let agg = AggregateError::new(vec![
            (TaskKey::Index(0), Reason::from("a")),
            (TaskKey::Index(1), Reason::from("b")),
        ]);
        assert_eq!(agg.to_string(), "all promises were rejected (2 reasons)");
        assert_eq!(agg.len(), 2);
    }
}
