//! The scheduling cycle.
//!
//! A [`Pipeline`] ties the pieces together: it collects samples, normalizes
//! them into observed entities, lets the [`HybridMerger`](crate::hybrid::HybridMerger)
//! fill and refresh placeholders, and sends the merged set. Each external
//! call goes through the [`RecoveryOrchestrator`](crate::recovery::RecoveryOrchestrator);
//! the synthesis collaborators are wrapped in [`GuardedEntityFactory`] and
//! [`GuardedPatternGenerator`] for that.

mod cycle;
mod guarded;

pub use cycle::{CycleReport, Pipeline, PipelineBuilder};
pub use guarded::{GuardedEntityFactory, GuardedPatternGenerator};
