// crates/waypost-store-sqlite/src/lib.rs
// ============================================================================
// Module: Waypost SQLite Store
// Description: Relational visitor and feedback stores.
// Purpose: Persist records in a normalized SQLite schema with transactional
//          lookup-then-upsert.
// Dependencies: rusqlite, serde, time, waypost-core
// ============================================================================

//! ## Overview
//! The SQLite backend is the default above demo scale. Visitors live in one
//! row per identity with a child `answers` table (cascade delete, replaced
//! wholesale per visit); feedback is a flat append-only table. The one write
//! path runs cooldown check, identity lookup, upsert, answer replacement,
//! and retention trim inside a single `IMMEDIATE` transaction, which is what
//! prevents two racing submissions for one identity from both inserting.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
