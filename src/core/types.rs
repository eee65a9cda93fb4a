//! Core types used throughout the queuebridge library.
//!
//! This module defines the canonical entity model: entity types, the
//! composite key that identifies an entity, the source tag that records
//! where an entity came from, and the entity itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metric values keyed by metric name.
pub type MetricMap = BTreeMap<String, f64>;

/// The kind of message-queue infrastructure an entity describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// A Kafka / MSK cluster.
    #[serde(rename = "AWSMSKCLUSTER")]
    Cluster,
    /// A broker inside a cluster.
    #[serde(rename = "AWSMSKBROKER")]
    Broker,
    /// A topic inside a cluster.
    #[serde(rename = "AWSMSKTOPIC")]
    Topic,
}

impl EntityType {
    /// All entity types, in topology order.
    pub const ALL: [EntityType; 3] = [Self::Cluster, Self::Broker, Self::Topic];

    /// Returns the backend entity type label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "AWSMSKCLUSTER",
            Self::Broker => "AWSMSKBROKER",
            Self::Topic => "AWSMSKTOPIC",
        }
    }

    /// Returns a short lowercase name, used in logs and display names.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Broker => "broker",
            Self::Topic => "topic",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entity's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Built from real collected samples.
    Observed,
    /// A placeholder that has not had its metrics recomputed yet.
    Synthesized,
    /// A placeholder whose metrics were recomputed at least once.
    SynthesizedRefresh,
}

impl EntitySource {
    /// Returns `true` for both synthesized variants.
    pub fn is_synthesized(&self) -> bool {
        matches!(self, Self::Synthesized | Self::SynthesizedRefresh)
    }

    /// Returns the source as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::Synthesized => "synthesized",
            Self::SynthesizedRefresh => "synthesized_refresh",
        }
    }
}

impl fmt::Display for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniquely identifies an entity: type, provider, cluster and local id.
///
/// For clusters the local id is the cluster name itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    /// The entity type.
    pub entity_type: EntityType,
    /// The infrastructure provider (e.g. `AwsMsk`).
    pub provider: String,
    /// The cluster the entity belongs to.
    pub cluster: String,
    /// Identifier of the entity within its cluster.
    pub local_id: String,
}

impl CompositeKey {
    /// Creates a new composite key.
    pub fn new(
        entity_type: EntityType,
        provider: impl Into<String>,
        cluster: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            provider: provider.into(),
            cluster: cluster.into(),
            local_id: local_id.into(),
        }
    }

    /// Creates the key of a cluster entity.
    pub fn cluster(provider: impl Into<String>, cluster: impl Into<String>) -> Self {
        let cluster = cluster.into();
        Self::new(EntityType::Cluster, provider, cluster.clone(), cluster)
    }

    /// Creates the key of a broker entity.
    pub fn broker(provider: impl Into<String>, cluster: impl Into<String>, broker_id: u32) -> Self {
        Self::new(EntityType::Broker, provider, cluster, broker_id.to_string())
    }

    /// Creates the key of a topic entity.
    pub fn topic(
        provider: impl Into<String>,
        cluster: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::new(EntityType::Topic, provider, cluster, topic)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.entity_type, self.provider, self.cluster, self.local_id
        )
    }
}

/// Identifying attributes handed to an entity factory for a missing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    /// Key the created entity must carry.
    pub key: CompositeKey,
    /// Human-readable display name.
    pub display_name: String,
    /// Free-form tags copied from the desired topology.
    pub tags: BTreeMap<String, String>,
}

impl EntityAttributes {
    /// Creates attributes with a display name derived from the key.
    pub fn for_key(key: CompositeKey) -> Self {
        let display_name = match key.entity_type {
            EntityType::Cluster => key.cluster.clone(),
            EntityType::Broker => format!("{}-broker-{}", key.cluster, key.local_id),
            EntityType::Topic => key.local_id.clone(),
        };
        let mut tags = BTreeMap::new();
        tags.insert("clusterName".to_string(), key.cluster.clone());
        tags.insert("provider".to_string(), key.provider.clone());
        Self {
            key,
            display_name,
            tags,
        }
    }

    /// Adds a tag.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

/// A canonical infrastructure entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The composite key identifying this entity.
    pub key: CompositeKey,
    /// Backend entity GUID.
    pub guid: String,
    /// Human-readable name.
    pub name: String,
    /// Latest metric values.
    pub metrics: MetricMap,
    /// Where the entity data came from.
    pub source: EntitySource,
    /// When the entity was last written.
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Creates a new entity with no metrics.
    pub fn new(
        key: CompositeKey,
        guid: impl Into<String>,
        name: impl Into<String>,
        source: EntitySource,
    ) -> Self {
        Self {
            key,
            guid: guid.into(),
            name: name.into(),
            metrics: MetricMap::new(),
            source,
            updated_at: Utc::now(),
        }
    }

    /// Sets the metrics.
    pub fn with_metrics(mut self, metrics: MetricMap) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets a single metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Returns the entity type.
    pub fn entity_type(&self) -> EntityType {
        self.key.entity_type
    }

    /// Returns `true` if the entity was built from real samples.
    pub fn is_observed(&self) -> bool {
        self.source == EntitySource::Observed
    }

    /// Returns `true` if the entity is a placeholder.
    pub fn is_synthesized(&self) -> bool {
        self.source.is_synthesized()
    }
}
