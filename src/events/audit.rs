//! Audit log emission.
//!
//! Every function logs one structured record with `target:
//! "queuebridge::audit"` and an `event_type` field, so the audit trail can be
//! routed separately from diagnostic logs.

use crate::core::{CompositeKey, GapFillError, RecoveryError};
use crate::events::bus::RecoveryEvent;
use crate::health::HealthStatus;
use crate::hybrid::FillSummary;
use crate::pipeline::CycleReport;
use crate::recovery::ComponentRole;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a skipped gap for audit logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedGap {
    /// Display form of the composite key.
    pub key: String,
    /// Failing step.
    pub stage: String,
    /// Reason given by the collaborator.
    pub reason: String,
}

impl From<&GapFillError> for SkippedGap {
    fn from(e: &GapFillError) -> Self {
        Self {
            key: e.key.to_string(),
            stage: e.stage.to_string(),
            reason: e.reason.clone(),
        }
    }
}

/// Forwards a lifecycle event to the matching `emit_*` function.
pub fn emit_event(event: &RecoveryEvent) {
    match event {
        RecoveryEvent::ComponentError {
            component,
            error,
            timestamp,
        } => emit_component_error(*component, error, *timestamp),
        RecoveryEvent::CircuitOpened {
            component,
            retry_in_ms,
            timestamp,
        } => emit_circuit_opened(*component, *retry_in_ms, *timestamp),
        RecoveryEvent::CircuitClosed {
            component,
            timestamp,
        } => emit_circuit_closed(*component, *timestamp),
        RecoveryEvent::HealthUpdate {
            status,
            issues,
            timestamp,
        } => emit_health_update(*status, issues, *timestamp),
    }
}

/// Emits an audit record for a failed guarded operation.
pub fn emit_component_error(component: ComponentRole, error: &str, timestamp: DateTime<Utc>) {
    tracing::warn!(
        target: "queuebridge::audit",
        event_type = "component_error",
        component = %component,
        error = %error,
        timestamp = %timestamp,
        "Component operation failed"
    );
}

/// Emits an audit record for a circuit opening.
pub fn emit_circuit_opened(component: ComponentRole, retry_in_ms: u64, timestamp: DateTime<Utc>) {
    tracing::warn!(
        target: "queuebridge::audit",
        event_type = "circuit_opened",
        component = %component,
        retry_in_ms = retry_in_ms,
        timestamp = %timestamp,
        "Circuit opened"
    );
}

/// Emits an audit record for a circuit closing.
pub fn emit_circuit_closed(component: ComponentRole, timestamp: DateTime<Utc>) {
    tracing::info!(
        target: "queuebridge::audit",
        event_type = "circuit_closed",
        component = %component,
        timestamp = %timestamp,
        "Circuit closed"
    );
}

/// Emits an audit record for a finished health pass.
pub fn emit_health_update(status: HealthStatus, issues: &[String], timestamp: DateTime<Utc>) {
    tracing::info!(
        target: "queuebridge::audit",
        event_type = "health_update",
        status = %status,
        issue_count = issues.len(),
        issues = ?issues,
        timestamp = %timestamp,
        "Health check completed"
    );
}

/// Emits an audit record for a gap fill pass.
pub fn emit_gap_fill(summary: &FillSummary) {
    let skipped: Vec<SkippedGap> = summary.skipped.iter().map(SkippedGap::from).collect();

    tracing::info!(
        target: "queuebridge::audit",
        event_type = "gap_fill",
        filled = summary.filled,
        already_synthesized = summary.already_synthesized,
        skipped_count = skipped.len(),
        skipped = ?skipped,
        coverage = summary.coverage.overall.coverage,
        missing = summary.coverage.missing,
        extra = summary.coverage.extra,
        "Gap fill completed"
    );
}

/// Emits an audit record for a dropped placeholder.
pub fn emit_synthesized_pruned(key: &CompositeKey) {
    tracing::info!(
        target: "queuebridge::audit",
        event_type = "synthesized_pruned",
        key = %key,
        "Synthesized entity no longer desired"
    );
}

/// Emits an audit record for a completed pipeline cycle.
pub fn emit_cycle_completed(report: &CycleReport) {
    tracing::info!(
        target: "queuebridge::audit",
        event_type = "cycle_completed",
        cycle_id = %report.cycle_id,
        collected = report.collected,
        observed = report.observed,
        filled = report.filled,
        skipped = report.skipped,
        refreshed = report.refreshed,
        accepted = report.sent.accepted,
        rejected = report.sent.rejected,
        coverage = report.coverage.overall.coverage,
        collect_outcome = %report.collect_outcome,
        health = %report.health,
        duration_ms = report.duration.as_millis() as u64,
        "Pipeline cycle completed"
    );
}

/// Emits an audit record for a failed pipeline cycle.
pub fn emit_cycle_failed(cycle_id: &uuid::Uuid, error: &RecoveryError) {
    tracing::warn!(
        target: "queuebridge::audit",
        event_type = "cycle_failed",
        cycle_id = %cycle_id,
        component = ?error.component(),
        circuit_open = error.is_circuit_open(),
        error = %error,
        "Pipeline cycle failed"
    );
}
