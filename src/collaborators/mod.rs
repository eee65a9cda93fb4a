//! Collaborator implementations.
//!
//! - [`MskEntityFactory`] and [`BaselinePatternGenerator`] are the reference
//!   synthesis collaborators for AWS MSK topologies.
//! - The `Mock*` types are deterministic, switchable stand-ins for tests and
//!   demos.

mod mock;
mod msk;

pub use mock::{MockCollector, MockEntityFactory, MockHealthCheck, MockPatternGenerator, MockSink};
pub use msk::{BaselinePatternGenerator, MskEntityFactory};
