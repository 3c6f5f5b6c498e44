// crates/waypost-api/src/health.rs
// ============================================================================
// Module: Health Reporting
// Description: Liveness report over the configured stores.
// Purpose: Expose readiness and uptime without leaking backend internals.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The health report probes both registries' backends and summarizes the
//! result. Probe failures mark the service unhealthy but never echo the
//! underlying error to the caller; the cause goes to the audit sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::audit::StorageFaultAuditEvent;
use crate::server::AppState;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Overall health report returned by `GET /health`.
#[derive(Debug, Serialize)]
pub(crate) struct HealthReport {
    /// `healthy` when every store probe succeeds.
    pub(crate) status: &'static str,
    /// Crate version.
    pub(crate) version: &'static str,
    /// Report timestamp, ISO-8601 UTC.
    pub(crate) timestamp: String,
    /// Seconds since the server started.
    pub(crate) uptime_secs: u64,
    /// Per-store readiness.
    pub(crate) store: StoreHealth,
}

/// Per-store readiness labels.
#[derive(Debug, Serialize)]
pub(crate) struct StoreHealth {
    /// Visitor store probe result.
    pub(crate) visitors: &'static str,
    /// Feedback store probe result.
    pub(crate) feedback: &'static str,
}

/// Probes both stores and assembles the report.
pub(crate) fn build_report(state: &AppState) -> HealthReport {
    let visitors = probe(state, "visitor_readiness", state.visitors.readiness());
    let feedback = probe(state, "feedback_readiness", state.feedback.readiness());
    let status = if visitors == "ready" && feedback == "ready" {
        "healthy"
    } else {
        "unhealthy"
    };
    HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::new()),
        uptime_secs: state.started_at.elapsed().as_secs(),
        store: StoreHealth {
            visitors,
            feedback,
        },
    }
}

/// Converts a probe result into a label, auditing failures.
fn probe(
    state: &AppState,
    operation: &'static str,
    result: Result<(), waypost_core::RegistryError>,
) -> &'static str {
    match result {
        Ok(()) => "ready",
        Err(err) => {
            state.audit.record_storage_fault(&StorageFaultAuditEvent::new(
                operation,
                err.to_string(),
            ));
            "unavailable"
        }
    }
}
