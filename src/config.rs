//! Engine-wide configuration.
//!
//! [`EngineConfig`] gathers the per-subsystem configurations. It can be
//! built in code, parsed from TOML, or read from `QUEUEBRIDGE_*`
//! environment variables. Every path ends in [`EngineConfig::validate`];
//! bad values are reported, never replaced by defaults.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::core::RecoveryError;
use crate::health::HealthConfig;
use crate::recovery::OrchestratorConfig;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Serializes a `Duration` as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes `duration` as milliseconds.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserializes milliseconds into a `Duration`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Breaker settings applied to components registered without their own.
    pub circuit: CircuitBreakerConfig,
    /// Orchestrator settings.
    pub orchestrator: OrchestratorConfig,
    /// Health aggregation settings.
    pub health: HealthConfig,
    /// Provider label on normalized entities.
    pub provider: String,
    /// Account id used in entity GUIDs.
    pub account_id: String,
    /// Cluster assumed for samples that do not name one.
    pub default_cluster: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitBreakerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            health: HealthConfig::default(),
            provider: "AwsMsk".to_string(),
            account_id: "123456789012".to_string(),
            default_cluster: "default-kafka-cluster".to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default circuit breaker configuration.
    pub fn with_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.circuit = circuit;
        self
    }

    /// Sets the orchestrator configuration.
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Sets the health configuration.
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    /// Sets the provider label.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Sets the account id.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, RecoveryError> {
        let config: Self = toml::from_str(document)
            .map_err(|e| RecoveryError::configuration(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, RecoveryError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, starting from defaults.
    ///
    /// Recognized keys:
    ///
    /// | Key | Field |
    /// |-----|-------|
    /// | `QUEUEBRIDGE_FAILURE_THRESHOLD` | `circuit.failure_threshold` |
    /// | `QUEUEBRIDGE_SUCCESS_THRESHOLD` | `circuit.success_threshold` |
    /// | `QUEUEBRIDGE_OPEN_TIMEOUT_MS` | `circuit.open_timeout` |
    /// | `QUEUEBRIDGE_RETRY_DELAY_MS` | `circuit.retry_delay` |
    /// | `QUEUEBRIDGE_MAX_CONCURRENT_RECOVERIES` | `orchestrator.max_concurrent_recoveries` |
    /// | `QUEUEBRIDGE_OPERATION_TIMEOUT_MS` | `orchestrator.default_timeout` |
    /// | `QUEUEBRIDGE_HEALTH_INTERVAL_MS` | `health.interval` |
    /// | `QUEUEBRIDGE_HEALTH_TIMEOUT_MS` | `health.probe_timeout` |
    /// | `QUEUEBRIDGE_PROVIDER` | `provider` |
    /// | `AWS_ACCOUNT_ID` | `account_id` |
    /// | `KAFKA_CLUSTER_NAME` | `default_cluster` |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RecoveryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_FAILURE_THRESHOLD")? {
            config.circuit.failure_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_SUCCESS_THRESHOLD")? {
            config.circuit.success_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_OPEN_TIMEOUT_MS")? {
            config.circuit.open_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_RETRY_DELAY_MS")? {
            config.circuit.retry_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_MAX_CONCURRENT_RECOVERIES")? {
            config.orchestrator.max_concurrent_recoveries = v;
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_OPERATION_TIMEOUT_MS")? {
            config.orchestrator.default_timeout = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_HEALTH_INTERVAL_MS")? {
            config.health.interval = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "QUEUEBRIDGE_HEALTH_TIMEOUT_MS")? {
            config.health.probe_timeout = Duration::from_millis(v);
        }
        if let Some(v) = lookup("QUEUEBRIDGE_PROVIDER") {
            config.provider = v;
        }
        if let Some(v) = lookup("AWS_ACCOUNT_ID") {
            config.account_id = v;
        }
        if let Some(v) = lookup("KAFKA_CLUSTER_NAME") {
            config.default_cluster = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        self.circuit.validate()?;
        self.orchestrator.validate()?;
        self.health.validate()?;
        if self.provider.trim().is_empty() {
            return Err(RecoveryError::configuration("provider must not be empty"));
        }
        if self.account_id.trim().is_empty() {
            return Err(RecoveryError::configuration("account_id must not be empty"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, RecoveryError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            RecoveryError::configuration(format!("{key}={raw:?} is not valid: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("QUEUEBRIDGE_FAILURE_THRESHOLD", "3"),
            ("QUEUEBRIDGE_OPEN_TIMEOUT_MS", "1000"),
            ("QUEUEBRIDGE_MAX_CONCURRENT_RECOVERIES", "2"),
            ("KAFKA_CLUSTER_NAME", "prod"),
        ]))
        .unwrap();

        assert_eq!(config.circuit.failure_threshold, 3);
        assert_eq!(config.circuit.open_timeout, Duration::from_secs(1));
        assert_eq!(config.orchestrator.max_concurrent_recoveries, 2);
        assert_eq!(config.default_cluster, "prod");
    }

    #[test]
    fn test_unparsable_value_is_fatal() {
        let result =
            EngineConfig::from_lookup(lookup_from(&[("QUEUEBRIDGE_FAILURE_THRESHOLD", "three")]));
        let err = result.unwrap_err();
        assert!(matches!(err, RecoveryError::Configuration { .. }));
        assert!(err.to_string().contains("QUEUEBRIDGE_FAILURE_THRESHOLD"));
    }

    #[test]
    fn test_invalid_value_is_fatal() {
        let result =
            EngineConfig::from_lookup(lookup_from(&[("QUEUEBRIDGE_SUCCESS_THRESHOLD", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_config() {
        let config = EngineConfig::from_toml_str(
            r#"
provider = "Kafka"

[circuit]
failure_threshold = 4
open_timeout_ms = 2500

[health]
interval_ms = 10000
"#,
        )
        .unwrap();

        assert_eq!(config.provider, "Kafka");
        assert_eq!(config.circuit.failure_threshold, 4);
        assert_eq!(config.circuit.open_timeout, Duration::from_millis(2500));
        assert_eq!(config.health.interval, Duration::from_secs(10));
    }
}
