//! System health aggregation.
//!
//! [`HealthAggregator`] probes every registered component, feeds the results
//! into the component breakers, and classifies the system as healthy,
//! degraded or unhealthy. [`HealthScheduler`] repeats that on a timer.

mod aggregator;
mod scheduler;
mod status;

pub use aggregator::HealthAggregator;
pub use scheduler::HealthScheduler;
pub use status::{ComponentHealth, HealthConfig, HealthStatus, SystemHealth};
