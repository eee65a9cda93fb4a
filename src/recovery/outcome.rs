//! Tagged results of guarded operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The value returned by a guarded operation, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The operation succeeded.
    Fresh(T),
    /// The operation failed and a cached value was returned instead.
    Cached(T),
    /// The operation failed and a degraded value was returned instead.
    Degraded(T),
}

impl<T> Outcome<T> {
    /// Returns the tag.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Fresh(_) => OutcomeKind::Fresh,
            Self::Cached(_) => OutcomeKind::Cached,
            Self::Degraded(_) => OutcomeKind::Degraded,
        }
    }

    /// Returns `true` if the operation itself succeeded.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// Returns `true` if the value came from a fallback.
    pub fn used_fallback(&self) -> bool {
        !self.is_fresh()
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(v) | Self::Cached(v) | Self::Degraded(v) => v,
        }
    }

    /// Consumes the outcome and returns the value.
    pub fn into_inner(self) -> T {
        match self {
            Self::Fresh(v) | Self::Cached(v) | Self::Degraded(v) => v,
        }
    }

    /// Maps the value, keeping the tag.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Fresh(v) => Outcome::Fresh(f(v)),
            Self::Cached(v) => Outcome::Cached(f(v)),
            Self::Degraded(v) => Outcome::Degraded(f(v)),
        }
    }
}

/// The tag of an [`Outcome`], without the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The operation succeeded.
    Fresh,
    /// A cached value was used.
    Cached,
    /// A degraded value was used.
    Degraded,
}

impl OutcomeKind {
    /// Returns the tag as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let fresh = Outcome::Fresh(3);
        assert!(fresh.is_fresh());
        assert_eq!(fresh.kind(), OutcomeKind::Fresh);
        assert_eq!(*fresh.value(), 3);

        let cached = Outcome::Cached(vec![1, 2]).map(|v| v.len());
        assert!(cached.used_fallback());
        assert_eq!(cached.kind(), OutcomeKind::Cached);
        assert_eq!(cached.into_inner(), 2);
    }
}
