// crates/waypost-core/src/lib.rs
// ============================================================================
// Module: Waypost Core
// Description: Domain model and orchestration for the Waypost visitor registry.
// Purpose: Define records, sanitization, identity resolution, store contracts,
//          and the registry logic shared by every storage backend.
// Dependencies: serde, serde_json, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! Waypost core holds everything storage backends and the HTTP surface agree
//! on: the [`VisitorRecord`] and [`FeedbackRecord`] data model, the
//! [`sanitize`] text pipeline, the [`IdentityKey`] dedup contract, the
//! [`VisitorStore`] / [`FeedbackStore`] capability traits, and the
//! [`VisitorRegistry`] / [`FeedbackRegistry`] orchestration. Policy (length
//! ceilings, the one-hour cooldown, the record capacity) lives here; backends
//! supply mechanism only.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod identifiers;
mod identity;
mod memory;
mod record;
mod registry;
mod sanitize;
mod store;

pub use identifiers::FeedbackId;
pub use identifiers::VisitorId;
pub use identity::IdentityKey;
pub use memory::MemoryFeedbackStore;
pub use memory::MemoryVisitorStore;
pub use record::AnswerMap;
pub use record::FeedbackRecord;
pub use record::VisitorRecord;
pub use registry::FEEDBACK_CAPACITY;
pub use registry::FeedbackRegistry;
pub use registry::FeedbackSubmission;
pub use registry::MAX_ANSWERS_JSON_LEN;
pub use registry::MAX_ANSWER_KEY_LEN;
pub use registry::MAX_ANSWER_VALUE_LEN;
pub use registry::MAX_FEEDBACK_TEXT_LEN;
pub use registry::MAX_FIELD_LEN;
pub use registry::MAX_NAME_LEN;
pub use registry::RATE_LIMIT_WINDOW;
pub use registry::RegistryError;
pub use registry::VISITOR_CAPACITY;
pub use registry::VisitSubmission;
pub use registry::VisitorRegistry;
pub use sanitize::sanitize;
pub use sanitize::sanitize_optional;
pub use store::FeedbackStore;
pub use store::SharedFeedbackStore;
pub use store::SharedVisitorStore;
pub use store::StoreError;
pub use store::VisitOutcome;
pub use store::VisitRequest;
pub use store::VisitorStore;
pub use store::apply_visit_to_records;
pub use store::trim_oldest_feedback;
pub use store::trim_oldest_visitors;
