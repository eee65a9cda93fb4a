//! Reference synthesis collaborators for AWS MSK topologies.

use crate::core::{
    entity_guid, CollaboratorError, Entity, EntityAttributes, EntityFactory, EntitySource,
    EntityType, MetricMap, PatternGenerator,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Builds GUID-bearing placeholder entities.
#[derive(Debug, Clone)]
pub struct MskEntityFactory {
    account_id: String,
}

impl MskEntityFactory {
    /// Creates a factory for `account_id`.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }
}

#[async_trait]
impl EntityFactory for MskEntityFactory {
    async fn create(
        &self,
        entity_type: EntityType,
        attributes: &EntityAttributes,
    ) -> Result<Entity, CollaboratorError> {
        let key = &attributes.key;
        if key.entity_type != entity_type {
            return Err(CollaboratorError::Synthesis {
                entity_type: entity_type.to_string(),
                local_id: key.local_id.clone(),
                reason: format!("attributes describe a {}", key.entity_type),
            });
        }
        if key.local_id.is_empty() {
            return Err(CollaboratorError::Synthesis {
                entity_type: entity_type.to_string(),
                local_id: String::new(),
                reason: "empty local id".to_string(),
            });
        }

        let guid = entity_guid(key, &self.account_id);
        Ok(Entity::new(
            key.clone(),
            guid,
            attributes.display_name.clone(),
            EntitySource::Synthesized,
        ))
    }
}

/// Produces steady baseline metrics for placeholders.
///
/// Initial values are fixed per entity type. Each refresh nudges the rate
/// metrics (`*PerSec*`) by at most 5% so dashboards show movement; gauges
/// that describe state, such as partition counts, stay put.
#[derive(Debug, Default)]
pub struct BaselinePatternGenerator {
    ticks: AtomicU64,
}

impl BaselinePatternGenerator {
    /// Creates a generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the baseline for `entity_type`.
    pub fn baseline(entity_type: EntityType) -> MetricMap {
        let pairs: &[(&str, f64)] = match entity_type {
            EntityType::Cluster => &[
                ("provider.activeControllerCount.Sum", 1.0),
                ("provider.offlinePartitionsCount.Sum", 0.0),
                ("provider.globalPartitionCount", 0.0),
                ("provider.globalTopicCount", 0.0),
            ],
            EntityType::Broker => &[
                ("provider.bytesInPerSec.Average", 1024.0),
                ("provider.bytesOutPerSec.Average", 2048.0),
                ("provider.messagesInPerSec.Average", 100.0),
                ("provider.cpuUser", 20.0),
                ("provider.memoryUsed", 50.0),
                ("provider.underReplicatedPartitions", 0.0),
                ("provider.leaderCount", 10.0),
            ],
            EntityType::Topic => &[
                ("provider.bytesInPerSec.Sum", 512.0),
                ("provider.bytesOutPerSec.Sum", 1024.0),
                ("provider.messagesInPerSec.Sum", 50.0),
                ("provider.partitionCount", 3.0),
            ],
        };
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }
}

#[async_trait]
impl PatternGenerator for BaselinePatternGenerator {
    async fn initial_metrics(
        &self,
        entity_type: EntityType,
        _attributes: &EntityAttributes,
    ) -> Result<MetricMap, CollaboratorError> {
        Ok(Self::baseline(entity_type))
    }

    async fn refresh_metrics(&self, entity: &Entity) -> Result<MetricMap, CollaboratorError> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let factor = 1.0 + 0.05 * (tick as f64).sin();

        let mut metrics = Self::baseline(entity.entity_type());
        for (name, value) in metrics.iter_mut() {
            if name.contains("PerSec") {
                *value *= factor;
            }
        }
        Ok(metrics)
    }
}
