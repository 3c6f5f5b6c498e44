// crates/waypost-core/src/store.rs
// ============================================================================
// Module: Waypost Store Contracts
// Description: Capability traits and shared apply logic for storage backends.
// Purpose: Let the registries drive interchangeable backends through one
//          contract with a single atomic write path.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Backends implement [`VisitorStore`] and [`FeedbackStore`]. The one
//! mutating visitor operation, [`VisitorStore::apply_visit`], receives a
//! fully prepared [`VisitRequest`] — sanitized fields plus the policy inputs
//! the registry computed — and must run cooldown check, identity resolution,
//! upsert, and capacity trim as a single atomic unit. Two concurrent
//! submissions for the same identity must never both insert.
//!
//! [`apply_visit_to_records`] is the pure reference implementation of that
//! unit over an in-memory record list; the memory and file backends call it
//! directly and the SQLite backend mirrors it in SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::identifiers::VisitorId;
use crate::identity::IdentityKey;
use crate::record::AnswerMap;
use crate::record::FeedbackRecord;
use crate::record::VisitorRecord;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage backend errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages avoid embedding caller-supplied payloads.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails to parse.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Stored data is structurally invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// The backend engine reported an error.
    #[error("store error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Visit Application
// ============================================================================

/// Fully prepared visit submission handed to a backend.
///
/// # Invariants
/// - Text fields are already sanitized; backends must not re-process them.
/// - `rate_cutoff` is strictly earlier than `visit_time`.
/// - Policy values (`rate_cutoff`, `max_records`) are computed by the
///   registry; backends treat them as opaque mechanism inputs.
#[derive(Debug, Clone)]
pub struct VisitRequest {
    /// Identifier to assign when the visit creates a fresh record.
    pub candidate_id: VisitorId,
    /// Sanitized display name.
    pub name: String,
    /// Optional sanitized agent classifier.
    pub agent_type: Option<String>,
    /// Optional sanitized purpose text.
    pub purpose: Option<String>,
    /// Sanitized answers replacing any previously stored set.
    pub answers: AnswerMap,
    /// Timestamp to record for this visit.
    pub visit_time: OffsetDateTime,
    /// Cooldown boundary: any record with the same name and a visit strictly
    /// after this instant blocks the submission.
    pub rate_cutoff: OffsetDateTime,
    /// Capacity ceiling applied after the write.
    pub max_records: usize,
}

/// Outcome of an atomic visit application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    /// The visit was accepted; the canonical record is returned.
    Recorded(VisitorRecord),
    /// A visit under the same name exists within the cooldown window.
    RateLimited,
}

// ============================================================================
// SECTION: Store Traits
// ============================================================================

/// Durable persistence for visitor records.
///
/// Both implementations must provide read-your-writes within one process:
/// a lookup immediately following a successful [`VisitorStore::apply_visit`]
/// on the same instance observes the just-written state.
pub trait VisitorStore: Send + Sync {
    /// Applies a prepared visit as one atomic unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot complete the write;
    /// no partial state may be retained on failure.
    fn apply_visit(&self, request: &VisitRequest) -> Result<VisitOutcome, StoreError>;

    /// Finds the single record matching the full identity, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<VisitorRecord>, StoreError>;

    /// Returns up to `limit` records ordered by `visit_time` descending.
    ///
    /// Ties are broken arbitrarily but consistently within a single call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the listing fails.
    fn list_recent(&self, limit: usize) -> Result<Vec<VisitorRecord>, StoreError>;

    /// Deletes oldest-by-`visit_time` records until at most `max_records`
    /// remain, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the trim fails.
    fn trim_to_capacity(&self, max_records: usize) -> Result<usize, StoreError>;

    /// Reports store readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Durable persistence for feedback records.
pub trait FeedbackStore: Send + Sync {
    /// Appends a feedback record, then trims to `max_records`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend cannot complete the write.
    fn append(&self, record: &FeedbackRecord, max_records: usize) -> Result<(), StoreError>;

    /// Returns up to `limit` records ordered by `submission_time` descending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the listing fails.
    fn list_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError>;

    /// Reports store readiness for liveness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Shared handle to a visitor store selected at startup.
pub type SharedVisitorStore = Arc<dyn VisitorStore>;

/// Shared handle to a feedback store selected at startup.
pub type SharedFeedbackStore = Arc<dyn FeedbackStore>;

// ============================================================================
// SECTION: Reference Apply Logic
// ============================================================================

/// Applies a prepared visit to an in-memory record list.
///
/// This is the reference semantics for [`VisitorStore::apply_visit`]:
/// cooldown check by name alone, identity resolution by the full pair,
/// in-place mutation with wholesale answer replacement, then a capacity
/// trim. Callers must hold whatever lock makes the surrounding
/// read-modify-write atomic.
#[must_use]
pub fn apply_visit_to_records(
    records: &mut Vec<VisitorRecord>,
    request: &VisitRequest,
) -> VisitOutcome {
    let blocked = records
        .iter()
        .any(|record| record.name == request.name && record.visit_time > request.rate_cutoff);
    if blocked {
        return VisitOutcome::RateLimited;
    }
    let key = IdentityKey::new(request.name.clone(), request.agent_type.clone());
    let updated = if let Some(existing) = records
        .iter_mut()
        .find(|record| key.matches(&record.name, record.agent_type.as_deref()))
    {
        existing.visit_count += 1;
        existing.visit_time = request.visit_time;
        existing.purpose = request.purpose.clone();
        existing.answers = request.answers.clone();
        existing.clone()
    } else {
        let record = VisitorRecord {
            id: request.candidate_id.clone(),
            name: request.name.clone(),
            agent_type: request.agent_type.clone(),
            purpose: request.purpose.clone(),
            visit_time: request.visit_time,
            visit_count: 1,
            answers: request.answers.clone(),
        };
        records.push(record.clone());
        record
    };
    let _ = trim_oldest_visitors(records, request.max_records);
    VisitOutcome::Recorded(updated)
}

/// Trims a visitor record list to `max_records`, oldest `visit_time` first.
///
/// Returns the number of records removed. Ordering among survivors is
/// newest-first after the call.
pub fn trim_oldest_visitors(records: &mut Vec<VisitorRecord>, max_records: usize) -> usize {
    if records.len() <= max_records {
        return 0;
    }
    records.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
    let removed = records.len() - max_records;
    records.truncate(max_records);
    removed
}

/// Trims a feedback record list to `max_records`, oldest first.
///
/// Returns the number of records removed.
pub fn trim_oldest_feedback(records: &mut Vec<FeedbackRecord>, max_records: usize) -> usize {
    if records.len() <= max_records {
        return 0;
    }
    records.sort_by(|a, b| b.submission_time.cmp(&a.submission_time));
    let removed = records.len() - max_records;
    records.truncate(max_records);
    removed
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions."
    )]

    use time::Duration;
    use time::OffsetDateTime;
    use time::macros::datetime;

    use super::VisitOutcome;
    use super::VisitRequest;
    use super::apply_visit_to_records;
    use super::trim_oldest_visitors;
    use crate::identifiers::VisitorId;
    use crate::record::AnswerMap;
    use crate::record::VisitorRecord;

    fn request_for(name: &str, agent_type: Option<&str>, now: OffsetDateTime) -> VisitRequest {
        VisitRequest {
            candidate_id: VisitorId::generate(),
            name: name.to_string(),
            agent_type: agent_type.map(str::to_string),
            purpose: None,
            answers: AnswerMap::new(),
            visit_time: now,
            rate_cutoff: now - Duration::hours(1),
            max_records: 1000,
        }
    }

    fn recorded(outcome: VisitOutcome) -> VisitorRecord {
        match outcome {
            VisitOutcome::Recorded(record) => record,
            VisitOutcome::RateLimited => panic!("expected a recorded visit"),
        }
    }

    #[test]
    fn fresh_identity_inserts_with_count_one() {
        let mut records = Vec::new();
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let record = recorded(apply_visit_to_records(&mut records, &request_for("Ada", None, now)));
        assert_eq!(record.visit_count, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record.id);
    }

    #[test]
    fn repeat_identity_outside_window_increments_in_place() {
        let mut records = Vec::new();
        let first_visit = datetime!(2026-03-01 10:00:00 UTC);
        let first = recorded(apply_visit_to_records(
            &mut records,
            &request_for("Ada", Some("GPT"), first_visit),
        ));
        let second_visit = first_visit + Duration::hours(2);
        let second = recorded(apply_visit_to_records(
            &mut records,
            &request_for("Ada", Some("GPT"), second_visit),
        ));
        assert_eq!(second.id, first.id);
        assert_eq!(second.visit_count, 2);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn same_name_within_window_is_rate_limited_across_agent_types() {
        let mut records = Vec::new();
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let _ = apply_visit_to_records(&mut records, &request_for("Ada", Some("GPT"), now));
        let retry = apply_visit_to_records(
            &mut records,
            &request_for("Ada", Some("Claude"), now + Duration::minutes(30)),
        );
        assert_eq!(retry, VisitOutcome::RateLimited);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn different_names_are_never_cross_limited() {
        let mut records = Vec::new();
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let _ = apply_visit_to_records(&mut records, &request_for("Ada", None, now));
        let other = apply_visit_to_records(
            &mut records,
            &request_for("Bob", None, now + Duration::minutes(1)),
        );
        assert!(matches!(other, VisitOutcome::Recorded(_)));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn answers_are_replaced_wholesale() {
        let mut records = Vec::new();
        let first_visit = datetime!(2026-03-01 10:00:00 UTC);
        let mut first = request_for("Ada", None, first_visit);
        first.answers.insert("q".to_string(), "x".to_string());
        first.answers.insert("stale".to_string(), "kept?".to_string());
        let _ = apply_visit_to_records(&mut records, &first);

        let mut second = request_for("Ada", None, first_visit + Duration::hours(2));
        second.answers.insert("q".to_string(), "y".to_string());
        let record = recorded(apply_visit_to_records(&mut records, &second));
        assert_eq!(record.answers.len(), 1);
        assert_eq!(record.answers.get("q").map(String::as_str), Some("y"));
    }

    #[test]
    fn trim_drops_oldest_records_first() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut records: Vec<VisitorRecord> = (0 .. 5)
            .map(|index| VisitorRecord {
                id: VisitorId::new(format!("record-{index}")),
                name: format!("visitor-{index}"),
                agent_type: None,
                purpose: None,
                visit_time: now + Duration::minutes(index),
                visit_count: 1,
                answers: AnswerMap::new(),
            })
            .collect();
        let removed = trim_oldest_visitors(&mut records, 3);
        assert_eq!(removed, 2);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.visit_time >= now + Duration::minutes(2)));
    }

    #[test]
    fn trim_is_a_no_op_below_capacity() {
        let mut records = Vec::new();
        assert_eq!(trim_oldest_visitors(&mut records, 10), 0);
    }
}
