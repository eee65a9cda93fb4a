//! Core types and traits for the queuebridge library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - The entity model: `Entity`, `CompositeKey`, `EntitySource`
//! - [`traits`] - Collaborator traits (collector, sink, factory, generator, health check)
//! - [`error`] - Structured error types
//! - [`sample`] - Raw samples and their normalization
//! - [`guid`] - Backend entity GUIDs
//! - [`topology`] - The declarative desired topology

pub mod error;
pub mod guid;
pub mod sample;
pub mod topology;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use error::{
    BoxError, CollaboratorError, CollaboratorResult, GapFillError, GapFillStage, RecoveryError,
    RecoveryResult, TopologyError,
};
pub use guid::entity_guid;
pub use sample::{Sample, SampleNormalizer};
pub use topology::{DesiredCluster, DesiredEntity, DesiredTopology};
pub use traits::{
    ArcCollector, ArcEntityFactory, ArcHealthCheck, ArcPatternGenerator, ArcSink, EntityFactory,
    HealthCheck, PatternGenerator, SampleCollector, SendAck, TelemetrySink,
};
pub use types::{CompositeKey, Entity, EntityAttributes, EntitySource, EntityType, MetricMap};
