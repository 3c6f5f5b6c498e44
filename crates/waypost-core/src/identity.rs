// crates/waypost-core/src/identity.rs
// ============================================================================
// Module: Waypost Identity Key
// Description: Deduplication key over sanitized (name, agent_type) pairs.
// Purpose: Decide whether a submission is a new visitor or a repeat visit.
// Dependencies: (none)
// ============================================================================

//! ## Overview
//! Two submissions resolve to the same identity iff their sanitized names
//! are byte-equal AND their agent types are byte-equal, with both-absent
//! counting as equal. No further normalization is applied: a trailing space
//! that survives sanitization makes a distinct visitor. That is a documented
//! simplification, not an oversight.

// ============================================================================
// SECTION: Identity Key
// ============================================================================

/// Deduplication key for a visitor identity.
///
/// # Invariants
/// - Fields hold sanitized values; construction performs no normalization.
/// - An absent `agent_type` is a distinct bucket from every present value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    /// Sanitized display name.
    name: String,
    /// Optional sanitized agent classifier.
    agent_type: Option<String>,
}

impl IdentityKey {
    /// Builds an identity key from sanitized fields.
    #[must_use]
    pub fn new(name: impl Into<String>, agent_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            agent_type,
        }
    }

    /// Returns the sanitized name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sanitized agent type component.
    #[must_use]
    pub fn agent_type(&self) -> Option<&str> {
        self.agent_type.as_deref()
    }

    /// Returns true when `name` and `agent_type` both match exactly.
    #[must_use]
    pub fn matches(&self, name: &str, agent_type: Option<&str>) -> bool {
        self.name == name && self.agent_type.as_deref() == agent_type
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
