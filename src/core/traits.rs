//! Collaborator traits.
//!
//! The engine never talks to Kafka, an observability backend, or a metric
//! generator directly. Everything external sits behind one of these traits
//! so it can be wrapped by the recovery orchestrator and replaced in tests.
//!
//! # Implementation Notes
//!
//! - Implementations must be `Send + Sync` for use in async contexts.
//! - Timeouts are applied by the caller; implementations do not need their own.
//! - Implementations should never panic; failures are returned as
//!   [`CollaboratorError`].

use crate::core::error::CollaboratorError;
use crate::core::sample::Sample;
use crate::core::types::{Entity, EntityAttributes, EntityType, MetricMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Source of raw metric samples.
#[async_trait]
pub trait SampleCollector: Send + Sync + Debug {
    /// Collects the current batch of samples.
    async fn collect(&self) -> Result<Vec<Sample>, CollaboratorError>;
}

/// Acknowledgement returned by a telemetry sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
    /// Number of entities the backend accepted.
    pub accepted: usize,
    /// Number of entities the backend rejected.
    pub rejected: usize,
}

impl SendAck {
    /// Returns `true` if some but not all entities were accepted.
    pub fn is_partial(&self) -> bool {
        self.accepted > 0 && self.rejected > 0
    }
}

/// Destination for the merged entity set.
#[async_trait]
pub trait TelemetrySink: Send + Sync + Debug {
    /// Sends a batch of entities.
    ///
    /// A sink may partially succeed; the returned [`SendAck`] says how much.
    async fn send(&self, entities: &[Entity]) -> Result<SendAck, CollaboratorError>;
}

/// Builds placeholder entities for gaps in the observed topology.
#[async_trait]
pub trait EntityFactory: Send + Sync + Debug {
    /// Creates an entity of `entity_type` carrying `attributes.key`.
    async fn create(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<Entity, CollaboratorError>;
}

/// Produces metric values for synthesized entities.
#[async_trait]
pub trait PatternGenerator: Send + Sync + Debug {
    /// Returns the first metric snapshot for a new placeholder.
    async fn initial_metrics(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<MetricMap, CollaboratorError>;

    /// Recomputes metrics for an existing placeholder.
    ///
    /// Defaults to a fresh initial snapshot.
    async fn refresh_metrics(&self, entity: &Entity) -> Result<MetricMap, CollaboratorError> {
        let attributes = EntityAttributes::for_key(entity.key.clone());
        self.initial_metrics(entity.entity_type(), &attributes).await
    }
}

/// A lightweight liveness probe for a registered component.
#[async_trait]
pub trait HealthCheck: Send + Sync + Debug {
    /// Returns `Ok(())` if the component is reachable and operational.
    async fn check(&self) -> Result<(), CollaboratorError>;
}

/// An arc-wrapped sample collector.
pub type ArcCollector = Arc<dyn SampleCollector>;

/// An arc-wrapped telemetry sink.
pub type ArcSink = Arc<dyn TelemetrySink>;

/// An arc-wrapped entity factory.
pub type ArcEntityFactory = Arc<dyn EntityFactory>;

/// An arc-wrapped pattern generator.
pub type ArcPatternGenerator = Arc<dyn PatternGenerator>;

/// An arc-wrapped health check.
pub type ArcHealthCheck = Arc<dyn HealthCheck>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_ack_partial() {
        assert!(SendAck { accepted: 3, rejected: 1 }.is_partial());
        assert!(!SendAck { accepted: 3, rejected: 0 }.is_partial());
        assert!(!SendAck::default().is_partial());
    }
}
