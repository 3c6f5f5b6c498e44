// crates/waypost-api/src/audit.rs
// ============================================================================
// Module: API Audit Logging
// Description: Structured audit events for HTTP request handling.
// Purpose: Emit redacted audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for request logging.
//! It is intentionally lightweight so deployments can route events to their
//! preferred logging pipeline without redesign. Storage fault events carry
//! the underlying error message for the operator; the HTTP response to the
//! caller stays generic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Events
// ============================================================================

/// HTTP request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Response status code.
    pub status: u16,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
}

impl RequestAuditEvent {
    /// Creates a request event with a consistent timestamp.
    #[must_use]
    pub fn new(method: String, path: String, status: u16, peer_ip: Option<String>) -> Self {
        Self {
            event: "request",
            timestamp_ms: now_millis(),
            method,
            path,
            status,
            peer_ip,
        }
    }
}

/// Storage fault audit event payload.
///
/// # Invariants
/// - `message` is operator-facing only; callers receive a generic failure.
#[derive(Debug, Clone, Serialize)]
pub struct StorageFaultAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Failing operation label.
    pub operation: &'static str,
    /// Underlying error message.
    pub message: String,
}

impl StorageFaultAuditEvent {
    /// Creates a storage fault event with a consistent timestamp.
    #[must_use]
    pub fn new(operation: &'static str, message: String) -> Self {
        Self {
            event: "storage_fault",
            timestamp_ms: now_millis(),
            operation,
            message,
        }
    }
}

/// Returns milliseconds since the unix epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for API events.
pub trait AuditSink: Send + Sync {
    /// Records a request event.
    fn record_request(&self, event: &RequestAuditEvent);

    /// Records a storage fault event.
    fn record_storage_fault(&self, event: &StorageFaultAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_storage_fault(&self, event: &StorageFaultAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record_request(&self, event: &RequestAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }

    fn record_storage_fault(&self, event: &StorageFaultAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_request(&self, _event: &RequestAuditEvent) {}

    fn record_storage_fault(&self, _event: &StorageFaultAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
