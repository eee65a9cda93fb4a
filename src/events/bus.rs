//! Lifecycle events and the observer bus that delivers them.

use crate::health::HealthStatus;
use crate::recovery::ComponentRole;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// The kinds of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A guarded operation or health probe failed.
    ComponentError,
    /// A circuit opened (or reopened from half-open).
    CircuitOpened,
    /// A half-open circuit closed.
    CircuitClosed,
    /// A health pass finished.
    HealthUpdate,
}

impl EventKind {
    /// Returns the event kind as a stable string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComponentError => "component_error",
            Self::CircuitOpened => "circuit_opened",
            Self::CircuitClosed => "circuit_closed",
            Self::HealthUpdate => "health_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// A guarded operation or health probe failed.
    ComponentError {
        /// The failing component.
        component: ComponentRole,
        /// Rendered error.
        error: String,
        /// When the failure was recorded.
        timestamp: DateTime<Utc>,
    },

    /// A circuit opened.
    CircuitOpened {
        /// The component whose circuit opened.
        component: ComponentRole,
        /// Milliseconds until a probe is allowed.
        retry_in_ms: u64,
        /// When the circuit opened.
        timestamp: DateTime<Utc>,
    },

    /// A circuit closed after successful probes.
    CircuitClosed {
        /// The component whose circuit closed.
        component: ComponentRole,
        /// When the circuit closed.
        timestamp: DateTime<Utc>,
    },

    /// A health pass finished.
    HealthUpdate {
        /// Classified system status.
        status: HealthStatus,
        /// Human-readable issues found in this pass.
        issues: Vec<String>,
        /// When the pass finished.
        timestamp: DateTime<Utc>,
    },
}

impl RecoveryEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ComponentError { .. } => EventKind::ComponentError,
            Self::CircuitOpened { .. } => EventKind::CircuitOpened,
            Self::CircuitClosed { .. } => EventKind::CircuitClosed,
            Self::HealthUpdate { .. } => EventKind::HealthUpdate,
        }
    }

    /// Returns the component this event concerns, if any.
    pub fn component(&self) -> Option<ComponentRole> {
        match self {
            Self::ComponentError { component, .. }
            | Self::CircuitOpened { component, .. }
            | Self::CircuitClosed { component, .. } => Some(*component),
            Self::HealthUpdate { .. } => None,
        }
    }

    /// Returns the event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ComponentError { timestamp, .. }
            | Self::CircuitOpened { timestamp, .. }
            | Self::CircuitClosed { timestamp, .. }
            | Self::HealthUpdate { timestamp, .. } => *timestamp,
        }
    }
}

/// A registered event handler.
pub type EventHandler = Arc<dyn Fn(&RecoveryEvent) + Send + Sync>;

/// Identifies a subscription so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: EventHandler,
}

/// Delivers lifecycle events to registered handlers.
///
/// Handlers run synchronously on the emitting task, in registration order.
/// The only ordering guaranteed is cause before effect: an event is emitted
/// after the transition it describes has been applied.
///
/// # Example
///
/// ```rust
/// use queuebridge::events::{EventBus, EventKind};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus = EventBus::new();
/// let opened = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&opened);
/// bus.on_event(EventKind::CircuitOpened, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
/// assert_eq!(bus.subscriber_count(), 1);
/// ```
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus that forwards every event to the audit log.
    pub fn with_audit_log() -> Self {
        let bus = Self::new();
        bus.on_all(crate::events::emit_event);
        bus
    }

    /// Registers `handler` for events of `kind`.
    pub fn on_event<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&RecoveryEvent) + Send + Sync + 'static,
    {
        self.subscribe(Some(kind), Arc::new(handler))
    }

    /// Registers `handler` for every event kind.
    pub fn on_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RecoveryEvent) + Send + Sync + 'static,
    {
        self.subscribe(None, Arc::new(handler))
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Returns the number of subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Delivers `event` to every matching handler.
    pub fn emit(&self, event: &RecoveryEvent) {
        let kind = event.kind();
        // Handlers may subscribe or unsubscribe, so they run outside the lock.
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    fn subscribe(&self, kind: Option<EventKind>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Subscription { id, kind, handler });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn closed(component: ComponentRole) -> RecoveryEvent {
        RecoveryEvent::CircuitClosed {
            component,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.on_event(EventKind::CircuitClosed, move |_| {
                seen.lock().unwrap().push(label);
            });
        }

        bus.emit(&closed(ComponentRole::TelemetrySink));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_kind_filtering() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let c = Arc::clone(&count);
        bus.on_event(EventKind::CircuitOpened, move |_| *c.lock().unwrap() += 1);
        let c = Arc::clone(&count);
        bus.on_all(move |_| *c.lock().unwrap() += 10);

        bus.emit(&closed(ComponentRole::SampleCollector));
        assert_eq!(*count.lock().unwrap(), 10);
    }

    #[test]
    fn test_off_removes_handler() {
        let bus = EventBus::new();
        let id = bus.on_event(EventKind::HealthUpdate, |_| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = RecoveryEvent::CircuitOpened {
            component: ComponentRole::TelemetrySink,
            retry_in_ms: 1000,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "circuit_opened");
        assert_eq!(json["component"], "telemetry_sink");
        assert_eq!(event.component(), Some(ComponentRole::TelemetrySink));
    }
}
