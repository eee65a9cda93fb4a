//! Guarded execution of external calls.
//!
//! Every call to an external collaborator goes through
//! [`RecoveryOrchestrator::execute`], which combines:
//!
//! - a per-component [`CircuitBreaker`](crate::circuit_breaker::CircuitBreaker),
//! - a per-attempt timeout,
//! - a global bound on concurrent attempts ([`RecoveryLimiter`]),
//! - optional in-call retries with exponential [`Backoff`],
//! - an explicit [`FallbackStrategy`].
//!
//! Components are registered once, up front, in a [`ComponentRegistry`].

mod fallback;
mod limiter;
mod orchestrator;
mod outcome;
mod registry;
mod retry;
mod stats;

pub use fallback::{CustomFallback, ExecuteOptions, FallbackStrategy};
pub use limiter::{RecoveryLimiter, RecoveryPermit};
pub use orchestrator::{OrchestratorConfig, RecoveryOrchestrator};
pub use outcome::{Outcome, OutcomeKind};
pub use registry::{
    ComponentHandle, ComponentKind, ComponentRegistry, ComponentRegistryBuilder, ComponentRole,
};
pub use retry::Backoff;
pub use stats::{ComponentStats, RecoveryAttempt, RecoveryStats};
