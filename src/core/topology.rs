//! Declarative desired topology.
//!
//! A desired topology lists the clusters that should exist together with
//! their brokers and topics. It is read-only input to reconciliation and can
//! be loaded from TOML or JSON:
//!
//! ```toml
//! provider = "AwsMsk"
//!
//! [[clusters]]
//! name = "prod"
//! brokers = [1, 2, 3]
//! topics = ["orders", "payments"]
//! ```

use crate::core::error::TopologyError;
use crate::core::types::{CompositeKey, EntityAttributes, EntityType};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The target shape of the infrastructure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredTopology {
    /// Provider every desired entity belongs to.
    pub provider: String,
    /// Desired clusters.
    #[serde(default)]
    pub clusters: Vec<DesiredCluster>,
}

/// One desired cluster with its brokers and topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredCluster {
    /// Cluster name.
    pub name: String,
    /// Broker ids.
    #[serde(default)]
    pub brokers: Vec<u32>,
    /// Topic names.
    #[serde(default)]
    pub topics: Vec<String>,
}

/// A single entity the topology asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredEntity {
    /// Key of the desired entity.
    pub key: CompositeKey,
    /// Identifying attributes used when it has to be synthesized.
    pub attributes: EntityAttributes,
}

impl DesiredEntity {
    fn new(key: CompositeKey) -> Self {
        Self {
            attributes: EntityAttributes::for_key(key.clone()),
            key,
        }
    }

    /// Returns the entity type.
    pub fn entity_type(&self) -> EntityType {
        self.key.entity_type
    }
}

impl DesiredTopology {
    /// Creates an empty topology for the given provider.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            clusters: Vec::new(),
        }
    }

    /// Adds a cluster.
    pub fn with_cluster(mut self, cluster: DesiredCluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    /// Parses a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, TopologyError> {
        let topology: Self = toml::from_str(document)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Parses a JSON document.
    pub fn from_json_str(document: &str) -> Result<Self, TopologyError> {
        let topology: Self = serde_json::from_str(document)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a topology file, choosing the format from the extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&document),
            _ => Self::from_toml_str(&document),
        }
    }

    /// Checks that names are present and unique.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.provider.trim().is_empty() {
            return Err(TopologyError::Invalid {
                reason: "provider must not be empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            if cluster.name.trim().is_empty() {
                return Err(TopologyError::Invalid {
                    reason: "cluster name must not be empty".to_string(),
                });
            }
            if !seen.insert(cluster.name.as_str()) {
                return Err(TopologyError::Invalid {
                    reason: format!("cluster '{}' is declared twice", cluster.name),
                });
            }
            if cluster.topics.iter().any(|t| t.trim().is_empty()) {
                return Err(TopologyError::Invalid {
                    reason: format!("cluster '{}' has an empty topic name", cluster.name),
                });
            }
        }
        Ok(())
    }

    /// Enumerates every desired entity: each cluster, then its brokers and topics.
    ///
    /// Repeated broker ids or topic names inside a cluster are listed once.
    pub fn entities(&self) -> Vec<DesiredEntity> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for cluster in &self.clusters {
            let keys = std::iter::once(CompositeKey::cluster(&self.provider, &cluster.name))
                .chain(
                    cluster
                        .brokers
                        .iter()
                        .map(|id| CompositeKey::broker(&self.provider, &cluster.name, *id)),
                )
                .chain(
                    cluster
                        .topics
                        .iter()
                        .map(|t| CompositeKey::topic(&self.provider, &cluster.name, t)),
                );

            for key in keys {
                if seen.insert(key.clone()) {
                    entities.push(DesiredEntity::new(key));
                }
            }
        }

        entities
    }

    /// Returns the number of desired entities.
    pub fn len(&self) -> usize {
        self.entities().len()
    }

    /// Returns `true` if the topology asks for nothing.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl DesiredCluster {
    /// Creates a cluster with no brokers or topics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brokers: Vec::new(),
            topics: Vec::new(),
        }
    }

    /// Sets the broker ids.
    pub fn with_brokers(mut self, brokers: impl IntoIterator<Item = u32>) -> Self {
        self.brokers = brokers.into_iter().collect();
        self
    }

    /// Sets the topic names.
    pub fn with_topics<S: Into<String>>(mut self, topics: impl IntoIterator<Item = S>) -> Self {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }
}
