//! Component registration.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::core::{ArcHealthCheck, RecoveryError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The fixed set of components the engine guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentRole {
    /// Pulls raw samples from the message-queue infrastructure.
    SampleCollector,
    /// Ships entities to the observability backend.
    TelemetrySink,
    /// Builds placeholder entities.
    EntityFactory,
    /// Produces metrics for placeholders.
    PatternGenerator,
    /// Cluster administration API.
    AdminApi,
    /// Metric query API.
    MetricApi,
}

impl ComponentRole {
    /// Every role, in registration order.
    pub const ALL: [ComponentRole; 6] = [
        Self::SampleCollector,
        Self::TelemetrySink,
        Self::EntityFactory,
        Self::PatternGenerator,
        Self::AdminApi,
        Self::MetricApi,
    ];

    /// Returns the role as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SampleCollector => "sample_collector",
            Self::TelemetrySink => "telemetry_sink",
            Self::EntityFactory => "entity_factory",
            Self::PatternGenerator => "pattern_generator",
            Self::AdminApi => "admin_api",
            Self::MetricApi => "metric_api",
        }
    }

    /// Returns the kind this role usually has.
    pub fn default_kind(&self) -> ComponentKind {
        match self {
            Self::SampleCollector => ComponentKind::Source,
            Self::TelemetrySink => ComponentKind::Sink,
            Self::EntityFactory | Self::PatternGenerator => ComponentKind::Synthesis,
            Self::AdminApi | Self::MetricApi => ComponentKind::Auxiliary,
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a component does in the data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Produces data.
    Source,
    /// Consumes data.
    Sink,
    /// Fills gaps in data.
    Synthesis,
    /// Anything else.
    Auxiliary,
}

/// A registered component.
#[derive(Debug, Clone)]
pub struct ComponentHandle {
    /// What the component does.
    pub kind: ComponentKind,
    /// Whether an unhealthy component makes the whole system unhealthy.
    pub critical: bool,
    /// Probe used by the health aggregator.
    pub health_check: ArcHealthCheck,
    /// Breaker settings; the registry default applies when `None`.
    pub circuit: Option<CircuitBreakerConfig>,
}

impl ComponentHandle {
    /// Creates a non-critical handle with the registry's default breaker.
    pub fn new(kind: ComponentKind, health_check: ArcHealthCheck) -> Self {
        Self {
            kind,
            critical: false,
            health_check,
            circuit: None,
        }
    }

    /// Marks the component as critical (or not).
    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Sets a component-specific breaker configuration.
    pub fn with_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.circuit = Some(circuit);
        self
    }
}

/// Immutable set of registered components.
///
/// Built once at startup with [`ComponentRegistry::builder`]; there is no way
/// to add or remove components afterwards.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    components: BTreeMap<ComponentRole, ComponentHandle>,
    default_circuit: CircuitBreakerConfig,
}

impl ComponentRegistry {
    /// Creates a new builder.
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    /// Returns the handle registered for `role`.
    pub fn get(&self, role: ComponentRole) -> Option<&ComponentHandle> {
        self.components.get(&role)
    }

    /// Returns `true` if `role` is registered.
    pub fn contains(&self, role: ComponentRole) -> bool {
        self.components.contains_key(&role)
    }

    /// Returns the breaker configuration in effect for `role`.
    pub fn circuit_config(&self, role: ComponentRole) -> Option<&CircuitBreakerConfig> {
        self.components
            .get(&role)
            .map(|handle| handle.circuit.as_ref().unwrap_or(&self.default_circuit))
    }

    /// Iterates over registrations in role order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentRole, &ComponentHandle)> {
        self.components.iter().map(|(role, handle)| (*role, handle))
    }

    /// Returns the registered roles in order.
    pub fn roles(&self) -> Vec<ComponentRole> {
        self.components.keys().copied().collect()
    }

    /// Returns the number of registered components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Builder for a [`ComponentRegistry`].
pub struct ComponentRegistryBuilder {
    components: BTreeMap<ComponentRole, ComponentHandle>,
    duplicates: Vec<ComponentRole>,
    default_circuit: CircuitBreakerConfig,
}

impl ComponentRegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            duplicates: Vec::new(),
            default_circuit: CircuitBreakerConfig::default(),
        }
    }

    /// Registers a component.
    pub fn register(mut self, role: ComponentRole, handle: ComponentHandle) -> Self {
        if self.components.insert(role, handle).is_some() {
            self.duplicates.push(role);
        }
        self
    }

    /// Sets the breaker configuration for components without their own.
    pub fn with_default_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.default_circuit = circuit;
        self
    }

    /// Validates and builds the registry.
    pub fn build(self) -> Result<ComponentRegistry, RecoveryError> {
        if let Some(role) = self.duplicates.first() {
            return Err(RecoveryError::configuration(format!(
                "component '{role}' registered more than once"
            )));
        }
        if self.components.is_empty() {
            return Err(RecoveryError::configuration(
                "at least one component is required",
            ));
        }

        self.default_circuit.validate()?;
        for (role, handle) in &self.components {
            if let Some(circuit) = &handle.circuit {
                circuit.validate().map_err(|e| {
                    RecoveryError::configuration(format!("component '{role}': {e}"))
                })?;
            }
        }

        Ok(ComponentRegistry {
            components: self.components,
            default_circuit: self.default_circuit,
        })
    }
}

impl Default for ComponentRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
