// crates/waypost-core/src/registry.rs
// ============================================================================
// Module: Waypost Registries
// Description: Visit and feedback orchestration over a storage backend.
// Purpose: Validate, sanitize, resolve identity, enforce the cooldown, and
//          persist submissions through the store contracts.
// Dependencies: serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! The registries own policy: field length ceilings, the one-hour per-name
//! cooldown, and the record capacity. They hold no mutable state of their
//! own — rate-limit and identity decisions always derive from durable
//! storage queries, so restarts and parallel workers stay consistent.
//!
//! The cooldown keys on `name` alone while identity dedup keys on the full
//! `(name, agent_type)` pair. The asymmetry is deliberate: it blocks rapid
//! resubmission under a spoofed agent type. Do not align the two.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::identifiers::FeedbackId;
use crate::identifiers::VisitorId;
use crate::record::AnswerMap;
use crate::record::FeedbackRecord;
use crate::record::VisitorRecord;
use crate::sanitize::sanitize;
use crate::sanitize::sanitize_optional;
use crate::store::SharedFeedbackStore;
use crate::store::SharedVisitorStore;
use crate::store::VisitOutcome;
use crate::store::VisitRequest;

// ============================================================================
// SECTION: Policy Constants
// ============================================================================

/// Maximum display name length in characters.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum length for visitor `agent_type` and `purpose` fields.
pub const MAX_FIELD_LEN: usize = 500;
/// Maximum answer key length in characters.
pub const MAX_ANSWER_KEY_LEN: usize = 50;
/// Maximum answer value length in characters; longer values are truncated.
pub const MAX_ANSWER_VALUE_LEN: usize = 500;
/// Maximum serialized size of an answer map in characters.
pub const MAX_ANSWERS_JSON_LEN: usize = 2000;
/// Maximum length for free-text feedback fields.
pub const MAX_FEEDBACK_TEXT_LEN: usize = 2000;
/// Cooldown window within which repeat visits under one name are rejected.
pub const RATE_LIMIT_WINDOW: Duration = Duration::HOUR;
/// Capacity ceiling for stored visitor records.
pub const VISITOR_CAPACITY: usize = 1000;
/// Capacity ceiling for stored feedback records.
pub const FEEDBACK_CAPACITY: usize = 1000;
/// Upper bound for `list` limits after clamping.
const MAX_LIST_LIMIT: usize = 100;
/// Inclusive usability rating bounds.
const RATING_RANGE: std::ops::RangeInclusive<u8> = 1 ..= 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry operation errors.
///
/// # Invariants
/// - `Validation` and `RateLimited` are caller-correctable; `Store` is a
///   server fault and its message must not reach clients verbatim.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed or oversized input; the message names the offending fields.
    #[error("invalid submission: {0}")]
    Validation(String),
    /// A visit under the same name happened within the cooldown window.
    #[error("rate limit exceeded; wait at least one hour between visits")]
    RateLimited,
    /// The storage backend failed.
    #[error("storage backend failure: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Submissions
// ============================================================================

/// Incoming visit submission, prior to validation and sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSubmission {
    /// Display name (required).
    pub name: String,
    /// Optional agent classifier.
    #[serde(default)]
    pub agent_type: Option<String>,
    /// Optional free-text purpose.
    #[serde(default)]
    pub purpose: Option<String>,
    /// Optional answer map; non-string values are stringified on intake.
    #[serde(default)]
    pub answers: Option<BTreeMap<String, Value>>,
}

/// Incoming feedback submission, prior to validation and sanitization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// Submitting agent name (required).
    pub agent_name: String,
    /// Optional agent classifier.
    #[serde(default)]
    pub agent_type: Option<String>,
    /// Optional issue report.
    #[serde(default)]
    pub issues: Option<String>,
    /// Optional feature requests.
    #[serde(default)]
    pub feature_requests: Option<String>,
    /// Optional usability rating within `1..=10`.
    #[serde(default)]
    pub usability_rating: Option<u8>,
    /// Optional free-form comments.
    #[serde(default)]
    pub additional_comments: Option<String>,
}

// ============================================================================
// SECTION: Visitor Registry
// ============================================================================

/// Orchestrates visit submissions over a storage backend.
pub struct VisitorRegistry {
    /// Backend selected at startup.
    store: SharedVisitorStore,
}

impl VisitorRegistry {
    /// Creates a registry over the provided store.
    #[must_use]
    pub fn new(store: SharedVisitorStore) -> Self {
        Self {
            store,
        }
    }

    /// Registers a visit at the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for malformed input,
    /// [`RegistryError::RateLimited`] within the cooldown window, and
    /// [`RegistryError::Store`] when the backend fails.
    pub fn register_visit(
        &self,
        submission: &VisitSubmission,
    ) -> Result<VisitorRecord, RegistryError> {
        self.register_visit_at(submission, OffsetDateTime::now_utc())
    }

    /// Registers a visit at an explicit timestamp.
    ///
    /// The explicit-time variant exists so cooldown behavior is testable
    /// without waiting out the window; production callers use
    /// [`Self::register_visit`].
    ///
    /// # Errors
    ///
    /// Same error contract as [`Self::register_visit`].
    pub fn register_visit_at(
        &self,
        submission: &VisitSubmission,
        now: OffsetDateTime,
    ) -> Result<VisitorRecord, RegistryError> {
        validate_visit(submission)?;
        let request = VisitRequest {
            candidate_id: VisitorId::generate(),
            name: sanitize(&submission.name, MAX_NAME_LEN),
            agent_type: sanitize_optional(submission.agent_type.as_deref(), MAX_FIELD_LEN),
            purpose: sanitize_optional(submission.purpose.as_deref(), MAX_FIELD_LEN),
            answers: submission.answers.as_ref().map(sanitize_answers).unwrap_or_default(),
            visit_time: now,
            rate_cutoff: now - RATE_LIMIT_WINDOW,
            max_records: VISITOR_CAPACITY,
        };
        let outcome = self
            .store
            .apply_visit(&request)
            .map_err(|err| RegistryError::Store(err.to_string()))?;
        match outcome {
            VisitOutcome::Recorded(record) => Ok(record),
            VisitOutcome::RateLimited => Err(RegistryError::RateLimited),
        }
    }

    /// Lists recent visitors, newest first, with the limit clamped to
    /// `[1, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the backend fails.
    pub fn list_visitors(&self, limit: usize) -> Result<Vec<VisitorRecord>, RegistryError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.store.list_recent(limit).map_err(|err| RegistryError::Store(err.to_string()))
    }

    /// Reports backend readiness.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the backend is unavailable.
    pub fn readiness(&self) -> Result<(), RegistryError> {
        self.store.readiness().map_err(|err| RegistryError::Store(err.to_string()))
    }
}

/// Validates a visit submission against raw-input ceilings.
fn validate_visit(submission: &VisitSubmission) -> Result<(), RegistryError> {
    let mut errors = Vec::new();
    if submission.name.trim().is_empty() {
        errors.push("name: name is required".to_string());
    } else if submission.name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name: must be at most {MAX_NAME_LEN} characters"));
    }
    if let Some(agent_type) = &submission.agent_type
        && agent_type.chars().count() > MAX_FIELD_LEN
    {
        errors.push(format!("agent_type: must be at most {MAX_FIELD_LEN} characters"));
    }
    if let Some(purpose) = &submission.purpose
        && purpose.chars().count() > MAX_FIELD_LEN
    {
        errors.push(format!("purpose: must be at most {MAX_FIELD_LEN} characters"));
    }
    if let Some(answers) = &submission.answers {
        match serde_json::to_string(answers) {
            Ok(serialized) if serialized.chars().count() > MAX_ANSWERS_JSON_LEN => {
                errors.push("answers: exceeded maximum allowed size".to_string());
            }
            Ok(_) => {}
            Err(_) => {
                errors.push("answers: must be a serializable map".to_string());
            }
        }
        if answers.keys().any(|key| key.chars().count() > MAX_ANSWER_KEY_LEN) {
            errors
                .push(format!("answers: keys must be at most {MAX_ANSWER_KEY_LEN} characters"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Validation(errors.join("; ")))
    }
}

/// Sanitizes an answer map, stringifying non-string values.
fn sanitize_answers(answers: &BTreeMap<String, Value>) -> AnswerMap {
    let mut sanitized = AnswerMap::new();
    for (key, value) in answers {
        let key = sanitize(key, MAX_ANSWER_KEY_LEN);
        if key.is_empty() {
            continue;
        }
        let value = match value {
            Value::String(text) => sanitize(text, MAX_ANSWER_VALUE_LEN),
            other => sanitize(&other.to_string(), MAX_ANSWER_VALUE_LEN),
        };
        sanitized.insert(key, value);
    }
    sanitized
}

// ============================================================================
// SECTION: Feedback Registry
// ============================================================================

/// Orchestrates feedback submissions over a storage backend.
///
/// Feedback is the visitor pipeline minus identity resolution and the
/// cooldown: validate, sanitize, append, trim.
pub struct FeedbackRegistry {
    /// Backend selected at startup.
    store: SharedFeedbackStore,
}

impl FeedbackRegistry {
    /// Creates a registry over the provided store.
    #[must_use]
    pub fn new(store: SharedFeedbackStore) -> Self {
        Self {
            store,
        }
    }

    /// Submits feedback at the current wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Validation`] for malformed input and
    /// [`RegistryError::Store`] when the backend fails.
    pub fn submit_feedback(
        &self,
        submission: &FeedbackSubmission,
    ) -> Result<FeedbackRecord, RegistryError> {
        self.submit_feedback_at(submission, OffsetDateTime::now_utc())
    }

    /// Submits feedback at an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Same error contract as [`Self::submit_feedback`].
    pub fn submit_feedback_at(
        &self,
        submission: &FeedbackSubmission,
        now: OffsetDateTime,
    ) -> Result<FeedbackRecord, RegistryError> {
        validate_feedback(submission)?;
        let record = FeedbackRecord {
            id: FeedbackId::generate(),
            agent_name: sanitize(&submission.agent_name, MAX_NAME_LEN),
            agent_type: sanitize_optional(submission.agent_type.as_deref(), MAX_NAME_LEN),
            submission_time: now,
            issues: sanitize_optional(submission.issues.as_deref(), MAX_FEEDBACK_TEXT_LEN),
            feature_requests: sanitize_optional(
                submission.feature_requests.as_deref(),
                MAX_FEEDBACK_TEXT_LEN,
            ),
            usability_rating: submission.usability_rating,
            additional_comments: sanitize_optional(
                submission.additional_comments.as_deref(),
                MAX_FEEDBACK_TEXT_LEN,
            ),
        };
        self.store
            .append(&record, FEEDBACK_CAPACITY)
            .map_err(|err| RegistryError::Store(err.to_string()))?;
        Ok(record)
    }

    /// Lists recent feedback, newest first, with the limit clamped to
    /// `[1, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the backend fails.
    pub fn list_feedback(&self, limit: usize) -> Result<Vec<FeedbackRecord>, RegistryError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.store.list_recent(limit).map_err(|err| RegistryError::Store(err.to_string()))
    }

    /// Reports backend readiness.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the backend is unavailable.
    pub fn readiness(&self) -> Result<(), RegistryError> {
        self.store.readiness().map_err(|err| RegistryError::Store(err.to_string()))
    }
}

/// Validates a feedback submission against raw-input ceilings.
fn validate_feedback(submission: &FeedbackSubmission) -> Result<(), RegistryError> {
    let mut errors = Vec::new();
    if submission.agent_name.trim().is_empty() {
        errors.push("agent_name: agent name is required".to_string());
    } else if submission.agent_name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("agent_name: must be at most {MAX_NAME_LEN} characters"));
    }
    if let Some(agent_type) = &submission.agent_type
        && agent_type.chars().count() > MAX_NAME_LEN
    {
        errors.push(format!("agent_type: must be at most {MAX_NAME_LEN} characters"));
    }
    for (field, value) in [
        ("issues", &submission.issues),
        ("feature_requests", &submission.feature_requests),
        ("additional_comments", &submission.additional_comments),
    ] {
        if let Some(text) = value
            && text.chars().count() > MAX_FEEDBACK_TEXT_LEN
        {
            errors.push(format!("{field}: must be at most {MAX_FEEDBACK_TEXT_LEN} characters"));
        }
    }
    if let Some(rating) = submission.usability_rating
        && !RATING_RANGE.contains(&rating)
    {
        errors.push("usability_rating: must be between 1 and 10".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Validation(errors.join("; ")))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
