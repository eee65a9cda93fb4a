//! Lifecycle events and audit logging.
//!
//! The orchestrator and the health aggregator publish [`RecoveryEvent`]s on
//! an [`EventBus`]. Handlers are plain closures registered per
//! [`EventKind`]. The audit functions turn events and pipeline reports into
//! structured `tracing` records:
//!
//! ```rust,ignore
//! // Route audit records to their own sink
//! tracing_subscriber::fmt()
//!     .with_env_filter("queuebridge::audit=info")
//!     .json()
//!     .init();
//! ```

mod audit;
mod bus;

pub use audit::{
    emit_circuit_closed, emit_circuit_opened, emit_component_error, emit_cycle_completed,
    emit_cycle_failed, emit_event, emit_gap_fill, emit_health_update, emit_synthesized_pruned,
    SkippedGap,
};
pub use bus::{EventBus, EventHandler, EventKind, RecoveryEvent, SubscriptionId};
