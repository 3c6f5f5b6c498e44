// crates/waypost-core/src/record.rs
// ============================================================================
// Module: Waypost Records
// Description: Visitor and feedback record types with stable wire forms.
// Purpose: Define the persisted data model shared by every storage backend.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`VisitorRecord`] is the canonical unit the visitor registry persists: one
//! record per `(name, agent_type)` identity, mutated in place on repeat
//! visits. [`FeedbackRecord`] is its append-only sibling. Timestamps are UTC
//! and serialize as ISO-8601 strings on the wire and in the file backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::identifiers::FeedbackId;
use crate::identifiers::VisitorId;

// ============================================================================
// SECTION: Visitor Record
// ============================================================================

/// Free-form answer map attached to a visit.
///
/// Keys are sanitized to at most 50 characters and values to at most 500.
/// The map is replaced wholesale on every visit, never merged.
pub type AnswerMap = BTreeMap<String, String>;

/// A single visitor identity and its running visit state.
///
/// # Invariants
/// - At most one record exists per `(name, agent_type)` pair; an absent
///   `agent_type` is its own identity bucket.
/// - `visit_count` is at least 1 and equals the number of accepted visits.
/// - `id` is assigned at first creation and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorRecord {
    /// Opaque record identifier.
    pub id: VisitorId,
    /// Sanitized display name.
    pub name: String,
    /// Optional sanitized classifier for the calling agent.
    pub agent_type: Option<String>,
    /// Optional sanitized free-text purpose.
    pub purpose: Option<String>,
    /// Timestamp of the most recent accepted visit.
    #[serde(with = "time::serde::rfc3339")]
    pub visit_time: OffsetDateTime,
    /// Number of accepted visits for this identity.
    pub visit_count: u64,
    /// Answers submitted with the most recent visit.
    #[serde(default)]
    pub answers: AnswerMap,
}

// ============================================================================
// SECTION: Feedback Record
// ============================================================================

/// A single appended feedback submission.
///
/// # Invariants
/// - Records are append-only; no identity resolution or cooldown applies.
/// - `usability_rating`, when present, is within `1..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Opaque record identifier.
    pub id: FeedbackId,
    /// Sanitized submitting agent name.
    pub agent_name: String,
    /// Optional sanitized classifier for the calling agent.
    pub agent_type: Option<String>,
    /// Timestamp of the submission.
    #[serde(with = "time::serde::rfc3339")]
    pub submission_time: OffsetDateTime,
    /// Optional sanitized issue report.
    pub issues: Option<String>,
    /// Optional sanitized feature requests.
    pub feature_requests: Option<String>,
    /// Optional usability rating within `1..=10`.
    pub usability_rating: Option<u8>,
    /// Optional sanitized free-form comments.
    pub additional_comments: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use time::macros::datetime;

    use super::AnswerMap;
    use super::VisitorRecord;
    use crate::identifiers::VisitorId;

    #[test]
    fn visitor_record_serializes_timestamps_as_iso8601() {
        let record = VisitorRecord {
            id: VisitorId::new("record-1"),
            name: "Ada".to_string(),
            agent_type: Some("GPT".to_string()),
            purpose: None,
            visit_time: datetime!(2026-03-01 12:30:00 UTC),
            visit_count: 2,
            answers: AnswerMap::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["visit_time"], "2026-03-01T12:30:00Z");
        assert_eq!(json["visit_count"], 2);
        assert_eq!(json["agent_type"], "GPT");
    }

    #[test]
    fn visitor_record_defaults_missing_answers_on_load() {
        let json = r#"{
            "id": "record-1",
            "name": "Ada",
            "agent_type": null,
            "purpose": null,
            "visit_time": "2026-03-01T12:30:00Z",
            "visit_count": 1
        }"#;
        let record: VisitorRecord = serde_json::from_str(json).unwrap();
        assert!(record.answers.is_empty());
        assert_eq!(record.agent_type, None);
    }
}
