//! Circuit breaker for dependency resilience.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to failing dependencies and periodically probing them to
//! detect recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through.
//! - **Open**: Dependency is failing; calls are rejected immediately.
//! - **Half-Open**: Probing the dependency to see if it has recovered.
//!
//! ## Usage
//!
//! ```rust
//! use queuebridge::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::default()
//!     .with_failure_threshold(3)
//!     .with_success_threshold(2)
//!     .with_open_timeout(Duration::from_secs(1));
//!
//! let breaker = CircuitBreaker::new("sample_collector", config);
//! ```

mod breaker;
mod config;
mod state;

pub use breaker::{CallPermit, CircuitBreaker};
pub use config::CircuitBreakerConfig;
pub use state::{
    Admission, BreakerMetrics, BreakerSnapshot, BreakerState, BreakerTransition, CircuitState,
};
