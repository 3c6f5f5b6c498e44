// crates/waypost-core/src/memory.rs
// ============================================================================
// Module: Waypost In-Memory Stores
// Description: Mutex-guarded in-memory store implementations.
// Purpose: Provide an ephemeral backend for tests and throwaway runs.
// Dependencies: (none)
// ============================================================================

//! ## Overview
//! The in-memory stores hold their record lists behind a mutex and reuse the
//! reference apply logic from [`crate::store`]. They satisfy the same
//! atomicity contract as the durable backends within a single process, but
//! lose all state on shutdown.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use crate::identity::IdentityKey;
use crate::record::FeedbackRecord;
use crate::record::VisitorRecord;
use crate::store::FeedbackStore;
use crate::store::StoreError;
use crate::store::VisitOutcome;
use crate::store::VisitRequest;
use crate::store::VisitorStore;
use crate::store::apply_visit_to_records;
use crate::store::trim_oldest_feedback;
use crate::store::trim_oldest_visitors;

// ============================================================================
// SECTION: Visitor Store
// ============================================================================

/// In-memory visitor store.
///
/// # Invariants
/// - The record list is only touched while the mutex is held, so every
///   operation is atomic with respect to concurrent callers.
#[derive(Debug, Default)]
pub struct MemoryVisitorStore {
    /// Guarded record list.
    records: Mutex<Vec<VisitorRecord>>,
}

impl MemoryVisitorStore {
    /// Creates an empty in-memory visitor store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VisitorStore for MemoryVisitorStore {
    fn apply_visit(&self, request: &VisitRequest) -> Result<VisitOutcome, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("visitor store mutex poisoned".to_string()))?;
        Ok(apply_visit_to_records(&mut records, request))
    }

    fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<VisitorRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("visitor store mutex poisoned".to_string()))?;
        Ok(records
            .iter()
            .find(|record| key.matches(&record.name, record.agent_type.as_deref()))
            .cloned())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<VisitorRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("visitor store mutex poisoned".to_string()))?;
        let mut sorted = records.clone();
        sorted.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
        sorted.truncate(limit);
        Ok(sorted)
    }

    fn trim_to_capacity(&self, max_records: usize) -> Result<usize, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("visitor store mutex poisoned".to_string()))?;
        Ok(trim_oldest_visitors(&mut records, max_records))
    }
}

// ============================================================================
// SECTION: Feedback Store
// ============================================================================

/// In-memory feedback store.
#[derive(Debug, Default)]
pub struct MemoryFeedbackStore {
    /// Guarded record list.
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    /// Creates an empty in-memory feedback store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackStore for MemoryFeedbackStore {
    fn append(&self, record: &FeedbackRecord, max_records: usize) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("feedback store mutex poisoned".to_string()))?;
        records.push(record.clone());
        let _ = trim_oldest_feedback(&mut records, max_records);
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Backend("feedback store mutex poisoned".to_string()))?;
        let mut sorted = records.clone();
        sorted.sort_by(|a, b| b.submission_time.cmp(&a.submission_time));
        sorted.truncate(limit);
        Ok(sorted)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
