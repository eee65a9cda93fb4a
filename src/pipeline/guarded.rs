//! Synthesis collaborators routed through the orchestrator.

use crate::core::{
    CollaboratorError, Entity, EntityAttributes, EntityFactory, EntityType, MetricMap,
    PatternGenerator, RecoveryError,
};
use crate::recovery::{ComponentRole, ExecuteOptions, RecoveryOrchestrator};

use async_trait::async_trait;

fn unguarded(role: ComponentRole, error: RecoveryError) -> CollaboratorError {
    CollaboratorError::unavailable(role.as_str(), error.to_string())
}

/// An [`EntityFactory`] whose calls go through the `entity_factory` breaker.
#[derive(Debug)]
pub struct GuardedEntityFactory<'a> {
    orchestrator: &'a RecoveryOrchestrator,
    inner: &'a dyn EntityFactory,
}

impl<'a> GuardedEntityFactory<'a> {
    /// Wraps `inner`.
    pub fn new(orchestrator: &'a RecoveryOrchestrator, inner: &'a dyn EntityFactory) -> Self {
        Self {
            orchestrator,
            inner,
        }
    }
}

#[async_trait]
impl<'a> EntityFactory for GuardedEntityFactory<'a> {
    async fn create(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<Entity, CollaboratorError> {
        self.orchestrator
            .execute(
                ComponentRole::EntityFactory,
                || self.inner.create(entity_type, attributes),
                ExecuteOptions::new(),
            )
            .await
            .map(|outcome| outcome.into_inner())
            .map_err(|e| unguarded(ComponentRole::EntityFactory, e))
    }
}

/// A [`PatternGenerator`] whose calls go through the `pattern_generator`
/// breaker.
#[derive(Debug)]
pub struct GuardedPatternGenerator<'a> {
    orchestrator: &'a RecoveryOrchestrator,
    inner: &'a dyn PatternGenerator,
}

impl<'a> GuardedPatternGenerator<'a> {
    /// Wraps `inner`.
    pub fn new(orchestrator: &'a RecoveryOrchestrator, inner: &'a dyn PatternGenerator) -> Self {
        Self {
            orchestrator,
            inner,
        }
    }
}

#[async_trait]
impl<'a> PatternGenerator for GuardedPatternGenerator<'a> {
    async fn initial_metrics(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<MetricMap, CollaboratorError> {
        self.orchestrator
            .execute(
                ComponentRole::PatternGenerator,
                || self.inner.initial_metrics(entity_type, attributes),
                ExecuteOptions::new(),
            )
            .await
            .map(|outcome| outcome.into_inner())
            .map_err(|e| unguarded(ComponentRole::PatternGenerator, e))
    }

    async fn refresh_metrics(&self, entity: &Entity) -> Result<MetricMap, CollaboratorError> {
        self.orchestrator
            .execute(
                ComponentRole::PatternGenerator,
                || self.inner.refresh_metrics(entity),
                ExecuteOptions::new(),
            )
            .await
            .map(|outcome| outcome.into_inner())
            .map_err(|e| unguarded(ComponentRole::PatternGenerator, e))
    }
}
