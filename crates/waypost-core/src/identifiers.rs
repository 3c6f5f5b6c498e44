// crates/waypost-core/src/identifiers.rs
// ============================================================================
// Module: Waypost Identifiers
// Description: Opaque identifiers for visitor and feedback records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Record identifiers are opaque UUID v4 strings assigned at first creation
//! and immutable thereafter. They serialize transparently as strings and
//! carry no ordering or structural meaning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Visitor record identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; assigned once at record creation, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    /// Creates a visitor identifier from an existing string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for VisitorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VisitorId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Feedback record identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; assigned once at record creation, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(String);

impl FeedbackId {
    /// Creates a feedback identifier from an existing string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FeedbackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FeedbackId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
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

    use super::FeedbackId;
    use super::VisitorId;

    #[test]
    fn generated_visitor_ids_are_distinct() {
        let first = VisitorId::generate();
        let second = VisitorId::generate();
        assert_ne!(first, second);
    }

    #[test]
    fn visitor_id_round_trips_through_serde() {
        let id = VisitorId::new("record-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"record-1\"");
        let back: VisitorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn feedback_id_preserves_string_form() {
        let id = FeedbackId::new("feedback-1");
        assert_eq!(id.as_str(), "feedback-1");
        assert_eq!(id.to_string(), "feedback-1");
    }
}
