//! Raw collector samples and their normalization into entities.

use crate::core::guid::entity_guid;
use crate::core::types::{CompositeKey, Entity, EntityAttributes, EntitySource, EntityType, MetricMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const CLUSTER_FIELDS: &[&str] = &["clusterName", "provider.clusterName", "cluster.name"];
const BROKER_FIELDS: &[&str] = &["broker.id", "brokerId", "provider.brokerId"];
const TOPIC_FIELDS: &[&str] = &["topic.name", "topic", "provider.topic"];

/// A raw metric sample as produced by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample event type, e.g. `KafkaBrokerSample`.
    pub event_type: String,
    /// Flat attribute map.
    pub attributes: BTreeMap<String, Value>,
}

impl Sample {
    /// Creates an empty sample of the given event type.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Infers the entity type from the event type name.
    pub fn entity_type(&self) -> Option<EntityType> {
        let event = self.event_type.to_ascii_lowercase();
        if event.contains("broker") {
            Some(EntityType::Broker)
        } else if event.contains("topic") {
            Some(EntityType::Topic)
        } else if event.contains("cluster") {
            Some(EntityType::Cluster)
        } else {
            None
        }
    }

    fn first_identifier(&self, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|field| match self.attributes.get(*field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => match n.as_u64() {
                Some(id) => Some(id.to_string()),
                None => n.as_f64().filter(|v| *v >= 0.0).map(|v| format!("{v:.0}")),
            },
            _ => None,
        })
    }
}

/// Turns collector samples into observed entities.
#[derive(Debug, Clone)]
pub struct SampleNormalizer {
    provider: String,
    account_id: String,
    default_cluster: String,
}

impl SampleNormalizer {
    /// Creates a normalizer for the given provider and account.
    pub fn new(
        provider: impl Into<String>,
        account_id: impl Into<String>,
        default_cluster: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            account_id: account_id.into(),
            default_cluster: default_cluster.into(),
        }
    }

    /// Normalizes one sample, or returns `None` if it cannot be identified.
    pub fn normalize(&self, sample: &Sample) -> Option<Entity> {
        let entity_type = sample.entity_type()?;
        let cluster = sample
            .first_identifier(CLUSTER_FIELDS)
            .unwrap_or_else(|| self.default_cluster.clone());

        let local_id = match entity_type {
            EntityType::Cluster => cluster.clone(),
            EntityType::Broker => sample.first_identifier(BROKER_FIELDS)?,
            EntityType::Topic => sample.first_identifier(TOPIC_FIELDS)?,
        };

        let key = CompositeKey::new(entity_type, self.provider.clone(), cluster, local_id);
        let guid = entity_guid(&key, &self.account_id);
        let name = EntityAttributes::for_key(key.clone()).display_name;

        Some(Entity::new(key, guid, name, EntitySource::Observed).with_metrics(metrics_of(sample)))
    }

    /// Normalizes a batch, dropping samples that cannot be identified.
    pub fn normalize_all(&self, samples: &[Sample]) -> Vec<Entity> {
        let entities: Vec<Entity> = samples.iter().filter_map(|s| self.normalize(s)).collect();
        let dropped = samples.len() - entities.len();
        if dropped > 0 {
            tracing::debug!(
                dropped,
                total = samples.len(),
                "Dropped samples without a recognizable entity identity"
            );
        }
        entities
    }
}

fn metrics_of(sample: &Sample) -> MetricMap {
    sample
        .attributes
        .iter()
        .filter(|(name, _)| {
            !CLUSTER_FIELDS
                .iter()
                .chain(BROKER_FIELDS)
                .chain(TOPIC_FIELDS)
                .any(|field| *field == name.as_str())
        })
        .filter_map(|(name, value)| {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .map(|v| (name.clone(), v))
        })
        .collect()
}
