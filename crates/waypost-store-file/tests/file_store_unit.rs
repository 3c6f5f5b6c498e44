// crates/waypost-store-file/tests/file_store_unit.rs
// ============================================================================
// Module: File Store Unit Tests
// Description: Integrity and concurrency tests for the JSON document stores.
// Purpose: Validate the persisted layout, lock-spanning read-modify-write,
//          cooldown and dedup semantics, retention, and corruption handling.
// ============================================================================

//! ## Overview
//! Unit-level tests for the file-backed stores:
//! - Document creation and the persisted JSON array layout
//! - Read-your-writes after `apply_visit`
//! - Cooldown-by-name and identity dedup semantics
//! - Retention trimming, oldest first
//! - Corruption surfacing as a typed error
//! - Concurrency safety (no duplicate identity under racing submissions)

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use waypost_core::AnswerMap;
use waypost_core::FeedbackId;
use waypost_core::FeedbackRecord;
use waypost_core::FeedbackStore;
use waypost_core::IdentityKey;
use waypost_core::StoreError;
use waypost_core::VisitOutcome;
use waypost_core::VisitRequest;
use waypost_core::VisitorId;
use waypost_core::VisitorStore;
use waypost_store_file::FileFeedbackStore;
use waypost_store_file::FileVisitorStore;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn visit_request(name: &str, agent_type: Option<&str>, now: OffsetDateTime) -> VisitRequest {
    VisitRequest {
        candidate_id: VisitorId::generate(),
        name: name.to_string(),
        agent_type: agent_type.map(str::to_string),
        purpose: Some("exploring".to_string()),
        answers: AnswerMap::new(),
        visit_time: now,
        rate_cutoff: now - Duration::hours(1),
        max_records: 1000,
    }
}

fn recorded(outcome: VisitOutcome) -> waypost_core::VisitorRecord {
    match outcome {
        VisitOutcome::Recorded(record) => record,
        VisitOutcome::RateLimited => panic!("expected a recorded visit"),
    }
}

fn feedback_record(agent_name: &str, at: OffsetDateTime) -> FeedbackRecord {
    FeedbackRecord {
        id: FeedbackId::generate(),
        agent_name: agent_name.to_string(),
        agent_type: None,
        submission_time: at,
        issues: None,
        feature_requests: None,
        usability_rating: Some(8),
        additional_comments: None,
    }
}

// ============================================================================
// SECTION: Document Layout
// ============================================================================

#[test]
fn open_seeds_an_empty_array_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data").join("visitors.json");
    let store = FileVisitorStore::open(&path).unwrap();
    assert_eq!(store.path(), path);
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "[]");
}

#[test]
fn persisted_layout_is_a_json_array_with_iso8601_timestamps() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("visitors.json");
    let store = FileVisitorStore::open(&path).unwrap();
    let mut request = visit_request("Ada", Some("GPT"), datetime!(2026-03-01 12:00:00 UTC));
    request.answers.insert("q".to_string(), "x".to_string());
    let _ = store.apply_visit(&request).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let entries = raw.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Ada");
    assert_eq!(entries[0]["visit_time"], "2026-03-01T12:00:00Z");
    assert_eq!(entries[0]["answers"]["q"], "x");
}

// ============================================================================
// SECTION: Visit Semantics
// ============================================================================

#[test]
fn read_your_writes_holds_after_apply() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let record = recorded(
        store.apply_visit(&visit_request("Ada", None, datetime!(2026-03-01 12:00:00 UTC))).unwrap(),
    );
    let found =
        store.find_by_identity(&IdentityKey::new("Ada", None)).unwrap().unwrap();
    assert_eq!(found, record);
}

#[test]
fn repeat_identity_reuses_id_and_increments_count() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let first_visit = datetime!(2026-03-01 12:00:00 UTC);
    let first =
        recorded(store.apply_visit(&visit_request("Ada", Some("GPT"), first_visit)).unwrap());
    let second = recorded(
        store
            .apply_visit(&visit_request("Ada", Some("GPT"), first_visit + Duration::hours(2)))
            .unwrap(),
    );
    assert_eq!(second.id, first.id);
    assert_eq!(second.visit_count, 2);
    assert_eq!(store.list_recent(10).unwrap().len(), 1);
}

#[test]
fn cooldown_blocks_same_name_regardless_of_agent_type() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let now = datetime!(2026-03-01 12:00:00 UTC);
    let _ = store.apply_visit(&visit_request("Ada", Some("GPT"), now)).unwrap();
    let retry = store
        .apply_visit(&visit_request("Ada", Some("Claude"), now + Duration::minutes(5)))
        .unwrap();
    assert_eq!(retry, VisitOutcome::RateLimited);
}

#[test]
fn list_recent_orders_newest_first_and_honors_limit() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let base = datetime!(2026-03-01 12:00:00 UTC);
    for (index, name) in ["first", "second", "third"].iter().enumerate() {
        let minutes = i64::try_from(index).unwrap();
        let _ = store
            .apply_visit(&visit_request(name, None, base + Duration::minutes(minutes)))
            .unwrap();
    }
    let listed = store.list_recent(2).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "third");
    assert_eq!(listed[1].name, "second");
}

#[test]
fn trim_drops_oldest_records_once_over_capacity() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let base = datetime!(2026-03-01 12:00:00 UTC);
    for index in 0 .. 6_i64 {
        let mut request =
            visit_request(&format!("visitor-{index}"), None, base + Duration::hours(index));
        request.max_records = 4;
        let _ = store.apply_visit(&request).unwrap();
    }
    let listed = store.list_recent(10).unwrap();
    assert_eq!(listed.len(), 4);
    assert!(listed.iter().all(|record| record.name != "visitor-0"));
    assert!(listed.iter().all(|record| record.name != "visitor-1"));
}

#[test]
fn explicit_trim_removes_oldest_and_reports_count() {
    let temp = TempDir::new().unwrap();
    let store = FileVisitorStore::open(temp.path().join("visitors.json")).unwrap();
    let base = datetime!(2026-03-01 12:00:00 UTC);
    for index in 0 .. 3_i64 {
        let _ = store
            .apply_visit(&visit_request(
                &format!("visitor-{index}"),
                None,
                base + Duration::hours(index),
            ))
            .unwrap();
    }
    assert_eq!(store.trim_to_capacity(2).unwrap(), 1);
    let listed = store.list_recent(10).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|record| record.name != "visitor-0"));
}

#[test]
fn corrupted_document_surfaces_a_typed_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("visitors.json");
    let store = FileVisitorStore::open(&path).unwrap();
    fs::write(&path, "{not json").unwrap();
    let err = store.list_recent(10).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn racing_first_visits_for_one_identity_never_duplicate() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileVisitorStore::open(temp.path().join("visitors.json")).unwrap());
    let now = datetime!(2026-03-01 12:00:00 UTC);
    let mut handles = Vec::new();
    for _ in 0 .. 8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.apply_visit(&visit_request("Bob", None, now)).unwrap()
        }));
    }
    let outcomes: Vec<VisitOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted =
        outcomes.iter().filter(|o| matches!(o, VisitOutcome::Recorded(_))).count();
    // All submissions share one visit_time, so the first writer wins and the
    // rest fall inside the cooldown window.
    assert_eq!(accepted, 1);
    let listed = store.list_recent(10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].visit_count, 1);
}

#[test]
fn racing_spaced_visits_keep_count_consistent_with_acceptances() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileVisitorStore::open(temp.path().join("visitors.json")).unwrap());
    let base = datetime!(2026-03-01 12:00:00 UTC);
    let mut handles = Vec::new();
    for index in 0 .. 6_i64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store
                .apply_visit(&visit_request("Bob", None, base + Duration::hours(2 * index)))
                .unwrap()
        }));
    }
    let outcomes: Vec<VisitOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted =
        u64::try_from(outcomes.iter().filter(|o| matches!(o, VisitOutcome::Recorded(_))).count())
            .unwrap();
    assert!(accepted >= 1);
    let listed = store.list_recent(10).unwrap();
    // Whatever the interleaving, exactly one record exists and its count
    // matches the number of accepted submissions.
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].visit_count, accepted);
}

// ============================================================================
// SECTION: Feedback Store
// ============================================================================

#[test]
fn feedback_appends_and_lists_newest_first() {
    let temp = TempDir::new().unwrap();
    let store = FileFeedbackStore::open(temp.path().join("feedback.json")).unwrap();
    assert!(store.path().ends_with("feedback.json"));
    let base = datetime!(2026-03-01 12:00:00 UTC);
    store.append(&feedback_record("Ada", base), 1000).unwrap();
    store.append(&feedback_record("Bob", base + Duration::minutes(1)), 1000).unwrap();
    let listed = store.list_recent(10).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].agent_name, "Bob");
}

#[test]
fn feedback_trims_to_capacity_on_append() {
    let temp = TempDir::new().unwrap();
    let store = FileFeedbackStore::open(temp.path().join("feedback.json")).unwrap();
    let base = datetime!(2026-03-01 12:00:00 UTC);
    for index in 0 .. 5_i64 {
        store
            .append(&feedback_record(&format!("agent-{index}"), base + Duration::minutes(index)), 3)
            .unwrap();
    }
    let listed = store.list_recent(10).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].agent_name, "agent-4");
}
