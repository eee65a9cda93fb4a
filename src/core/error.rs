//! Error types for the queuebridge library.
//!
//! Failures are split by who observes them: [`RecoveryError`] is what callers
//! of the orchestrator see, [`CollaboratorError`] is what external
//! collaborators report, [`GapFillError`] describes a single skipped gap, and
//! [`TopologyError`] covers loading a desired topology document.
//!
//! The library never panics; all errors are returned as `Result` values.

use crate::core::types::CompositeKey;

use std::time::Duration;
use thiserror::Error;

/// A boxed error raised by a guarded operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for guarded operations.
///
/// Every variant names the component it concerns (when there is one) so the
/// caller can decide between cached data, synthesized data, or giving up on
/// the current cycle.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The guarded operation itself failed.
    #[error("component '{component}' failed: {source}")]
    Operation {
        /// Name of the component whose operation failed.
        component: String,
        /// The error raised by the operation.
        #[source]
        source: BoxError,
    },

    /// The guarded operation did not finish within its timeout.
    #[error("operation on component '{component}' timed out after {elapsed:?}")]
    Timeout {
        /// Name of the component that timed out.
        component: String,
        /// The timeout that elapsed.
        elapsed: Duration,
    },

    /// The circuit breaker is open; the operation was not attempted.
    #[error("circuit breaker open for component '{component}'")]
    CircuitOpen {
        /// Name of the component with open circuit.
        component: String,
        /// Time left until a probe is allowed, if known.
        retry_in: Option<Duration>,
    },

    /// No recovery slot became free before the caller's deadline.
    #[error("recovery capacity exhausted for component '{component}' after waiting {waited:?}")]
    Saturated {
        /// Name of the component the call was for.
        component: String,
        /// How long the call waited for a slot.
        waited: Duration,
    },

    /// The component was never registered.
    #[error("component '{component}' is not registered")]
    UnknownComponent {
        /// Name of the unknown component.
        component: String,
    },

    /// A custom fallback could not produce a value.
    #[error("fallback for component '{component}' failed: {message}")]
    FallbackFailed {
        /// Name of the component.
        component: String,
        /// Description of the fallback failure.
        message: String,
    },

    /// Configuration error. Fatal at startup.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl RecoveryError {
    /// Returns `true` if this is a circuit-open rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if the failure is transient and a later cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Operation { .. }
                | Self::Timeout { .. }
                | Self::CircuitOpen { .. }
                | Self::Saturated { .. }
        )
    }

    /// Returns `true` if this failure should be counted against a breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Self::Operation { .. } | Self::Timeout { .. })
    }

    /// Returns the component name if this error is associated with one.
    pub fn component(&self) -> Option<&str> {
        match self {
            Self::Operation { component, .. }
            | Self::Timeout { component, .. }
            | Self::CircuitOpen { component, .. }
            | Self::Saturated { component, .. }
            | Self::UnknownComponent { component }
            | Self::FallbackFailed { component, .. } => Some(component),
            Self::Configuration { .. } => None,
        }
    }

    /// Creates an `Operation` error wrapping the given source.
    pub fn operation<E>(component: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Operation {
            component: component.into(),
            source: source.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(component: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            component: component.into(),
            elapsed,
        }
    }

    /// Creates a `CircuitOpen` error.
    pub fn circuit_open(component: impl Into<String>, retry_in: Option<Duration>) -> Self {
        Self::CircuitOpen {
            component: component.into(),
            retry_in,
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error type reported by external collaborators.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The collaborator could not be reached.
    #[error("'{component}' is unavailable: {reason}")]
    Unavailable {
        /// Collaborator name.
        component: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The collaborator refused the request.
    #[error("'{component}' rejected the request: {reason}")]
    Rejected {
        /// Collaborator name.
        component: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A placeholder entity or its metrics could not be built.
    #[error("cannot synthesize {entity_type} '{local_id}': {reason}")]
    Synthesis {
        /// The entity type label.
        entity_type: String,
        /// The local id of the entity.
        local_id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Creates an `Unavailable` error.
    pub fn unavailable(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Rejected` error.
    pub fn rejected(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// The step of a gap fill that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFillStage {
    /// The entity factory failed.
    Factory,
    /// The pattern generator failed.
    Generator,
    /// The factory returned an entity for a different key.
    KeyMismatch,
}

impl std::fmt::Display for GapFillStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory => write!(f, "factory"),
            Self::Generator => write!(f, "generator"),
            Self::KeyMismatch => write!(f, "key_mismatch"),
        }
    }
}

/// A single gap that could not be filled.
///
/// Gap fill failures are isolated: the merger records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("gap fill for {key} skipped at {stage}: {reason}")]
pub struct GapFillError {
    /// Key of the entity that stays missing.
    pub key: CompositeKey,
    /// Which step failed.
    pub stage: GapFillStage,
    /// Human-readable reason.
    pub reason: String,
}

/// Error type for loading a desired topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The document could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML document is malformed.
    #[error("invalid TOML topology: {0}")]
    Toml(#[from] toml::de::Error),

    /// The JSON document is malformed.
    #[error("invalid JSON topology: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but describes an invalid topology.
    #[error("invalid topology: {reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
}

/// A specialized `Result` type for guarded operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// A specialized `Result` type for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
