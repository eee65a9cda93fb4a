//! # Queuebridge
//!
//! A resilience and topology reconciliation engine for message-queue
//! entity synthesis.
//!
//! ## Overview
//!
//! Queuebridge sits between a Kafka/MSK metric collector and an
//! observability backend. It keeps the backend's view of the cluster
//! complete and current even while parts of the pipeline fail:
//!
//! - Every external call runs behind a per-component circuit breaker
//! - Failed calls fall back to cached or degraded values instead of erroring
//! - Component health is probed periodically and classified system-wide
//! - Observed entities are diffed against a declared desired topology
//! - Gaps are filled with synthesized placeholders, which real data always
//!   replaces
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use queuebridge::prelude::*;
//! use queuebridge::collaborators::{BaselinePatternGenerator, MskEntityFactory};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ComponentRegistry::builder()
//!         .register(ComponentRole::SampleCollector, collector_handle)
//!         .register(ComponentRole::TelemetrySink, sink_handle)
//!         .register(ComponentRole::EntityFactory, factory_handle)
//!         .register(ComponentRole::PatternGenerator, generator_handle)
//!         .build()?;
//!
//!     let orchestrator = Arc::new(RecoveryOrchestrator::new(
//!         registry,
//!         OrchestratorConfig::default(),
//!         Arc::new(EventBus::with_audit_log()),
//!     )?);
//!
//!     let pipeline = Pipeline::builder(orchestrator)
//!         .with_collector(collector)
//!         .with_sink(sink)
//!         .with_entity_factory(Arc::new(MskEntityFactory::new("123456789012")))
//!         .with_pattern_generator(Arc::new(BaselinePatternGenerator::new()))
//!         .with_desired_topology(DesiredTopology::load("topology.toml")?)
//!         .build()?;
//!
//!     let report = pipeline.run_cycle().await?;
//!     println!("coverage: {}%", report.coverage.overall.coverage);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Entity model, collaborator traits, error handling
//! - **Circuit Breaker**: Per-component failure gating
//! - **Recovery**: Guarded execution with timeouts, retries, concurrency
//!   limits and fallbacks
//! - **Health**: Probing and system-wide classification
//! - **Reconcile**: Observed-versus-desired gap analysis
//! - **Hybrid**: The merged observed + synthesized entity set
//! - **Pipeline**: The end-to-end scheduling cycle
//! - **Events**: Lifecycle events and structured audit logging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod events;
pub mod health;
pub mod hybrid;
pub mod pipeline;
pub mod reconcile;
pub mod recovery;

// Re-export commonly used types at the crate root
pub use crate::core::{
    CollaboratorError, CompositeKey, DesiredTopology, Entity, EntitySource, EntityType,
    GapFillError, RecoveryError, RecoveryResult,
};

pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use crate::config::EngineConfig;
pub use crate::events::{EventBus, RecoveryEvent};
pub use crate::health::{HealthAggregator, HealthScheduler, HealthStatus, SystemHealth};
pub use crate::hybrid::HybridMerger;
pub use crate::pipeline::{CycleReport, Pipeline};
pub use crate::reconcile::{GapAnalysis, TopologyReconciler};
pub use crate::recovery::{ComponentRole, FallbackStrategy, Outcome, RecoveryOrchestrator};

/// Prelude module for convenient imports.
///
/// ```rust
/// use queuebridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        CollaboratorError, CompositeKey, DesiredCluster, DesiredTopology, Entity,
        EntityAttributes, EntityFactory, EntitySource, EntityType, HealthCheck, PatternGenerator,
        RecoveryError, Sample, SampleCollector, SendAck, TelemetrySink,
    };
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::config::EngineConfig;
    pub use crate::events::{EventBus, EventKind, RecoveryEvent};
    pub use crate::health::{HealthAggregator, HealthConfig, HealthScheduler, HealthStatus};
    pub use crate::hybrid::HybridMerger;
    pub use crate::pipeline::{CycleReport, Pipeline};
    pub use crate::reconcile::TopologyReconciler;
    pub use crate::recovery::{
        ComponentHandle, ComponentKind, ComponentRegistry, ComponentRole, ExecuteOptions,
        FallbackStrategy, OrchestratorConfig, Outcome, RecoveryOrchestrator,
    };
}
