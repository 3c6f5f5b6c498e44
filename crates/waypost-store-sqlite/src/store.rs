// crates/waypost-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store Implementation
// Description: Visitor and feedback stores over a shared SQLite connection.
// Purpose: Implement the core store contracts with transactional writes.
// Dependencies: rusqlite, serde, time, waypost-core
// ============================================================================

//! ## Overview
//! One [`SqliteStore`] implements both store contracts over a mutex-guarded
//! connection. Timestamps are stored as unix milliseconds; the wire form
//! converts back to UTC [`OffsetDateTime`] values on load. Uniqueness of the
//! `(name, agent_type)` identity is enforced at the application layer by the
//! transactional lookup-then-upsert in [`SqliteStore`]'s visit path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use time::OffsetDateTime;
use waypost_core::AnswerMap;
use waypost_core::FeedbackId;
use waypost_core::FeedbackRecord;
use waypost_core::FeedbackStore;
use waypost_core::IdentityKey;
use waypost_core::StoreError;
use waypost_core::VisitOutcome;
use waypost_core::VisitRequest;
use waypost_core::VisitorId;
use waypost_core::VisitorRecord;
use waypost_core::VisitorStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed visitor and feedback store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Every mutation runs inside an `IMMEDIATE` transaction, so lookups and
///   the subsequent upsert observe a consistent snapshot.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an `SQLite` store, creating and migrating the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        if config.path.is_dir() {
            return Err(StoreError::Invalid(format!(
                "sqlite path is a directory: {}",
                config.path.display()
            )));
        }
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
        }
        let mut connection =
            Connection::open(&config.path).map_err(|err| StoreError::Backend(err.to_string()))?;
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        connection
            .execute_batch("PRAGMA journal_mode = wal;")
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        connection
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection, surfacing poisoning as a backend error.
    fn lock_connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates tables and records the schema version.
fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection
        .transaction()
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta ORDER BY version DESC LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS visitors (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    agent_type TEXT,
                    purpose TEXT,
                    visit_time INTEGER NOT NULL,
                    visit_count INTEGER NOT NULL DEFAULT 1,
                    CONSTRAINT name_length CHECK (length(name) <= 100),
                    CONSTRAINT agent_type_length CHECK (length(agent_type) <= 500),
                    CONSTRAINT purpose_length CHECK (length(purpose) <= 500)
                );
                CREATE INDEX IF NOT EXISTS idx_visitors_name ON visitors (name);
                CREATE INDEX IF NOT EXISTS idx_visitors_visit_time ON visitors (visit_time);
                CREATE TABLE IF NOT EXISTS answers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    visitor_id TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    FOREIGN KEY (visitor_id) REFERENCES visitors (id) ON DELETE CASCADE,
                    CONSTRAINT key_length CHECK (length(key) <= 50),
                    CONSTRAINT value_length CHECK (length(value) <= 500)
                );
                CREATE INDEX IF NOT EXISTS idx_answers_visitor_id ON answers (visitor_id);
                CREATE TABLE IF NOT EXISTS feedback (
                    id TEXT PRIMARY KEY,
                    agent_name TEXT NOT NULL,
                    agent_type TEXT,
                    submission_time INTEGER NOT NULL,
                    issues TEXT,
                    feature_requests TEXT,
                    usability_rating INTEGER,
                    additional_comments TEXT,
                    CONSTRAINT agent_name_length CHECK (length(agent_name) <= 100),
                    CONSTRAINT agent_type_length CHECK (length(agent_type) <= 100),
                    CONSTRAINT issues_length CHECK (length(issues) <= 2000),
                    CONSTRAINT feature_requests_length CHECK (length(feature_requests) <= 2000),
                    CONSTRAINT additional_comments_length
                        CHECK (length(additional_comments) <= 2000),
                    CONSTRAINT usability_rating_range
                        CHECK (usability_rating BETWEEN 1 AND 10)
                );
                CREATE INDEX IF NOT EXISTS idx_feedback_submission_time
                    ON feedback (submission_time);",
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(StoreError::Invalid(format!(
                "sqlite schema version mismatch: found {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(|err| StoreError::Backend(err.to_string()))
}

// ============================================================================
// SECTION: Time Mapping
// ============================================================================

/// Converts a timestamp to stored unix milliseconds.
fn to_unix_millis(timestamp: OffsetDateTime) -> Result<i64, StoreError> {
    i64::try_from(timestamp.unix_timestamp_nanos() / 1_000_000)
        .map_err(|_| StoreError::Invalid("timestamp out of range".to_string()))
}

/// Converts stored unix milliseconds back to a UTC timestamp.
fn from_unix_millis(millis: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| StoreError::Corrupt(format!("invalid stored timestamp: {millis}")))
}

// ============================================================================
// SECTION: Visitor Store
// ============================================================================

impl VisitorStore for SqliteStore {
    fn apply_visit(&self, request: &VisitRequest) -> Result<VisitOutcome, StoreError> {
        let mut guard = self.lock_connection()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let cutoff = to_unix_millis(request.rate_cutoff)?;
        let recent: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM visitors WHERE name = ?1 AND visit_time > ?2",
                params![request.name, cutoff],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        if recent > 0 {
            tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
            return Ok(VisitOutcome::RateLimited);
        }
        let visit_time = to_unix_millis(request.visit_time)?;
        let existing = find_identity_row(&tx, &request.name, request.agent_type.as_deref())?;
        let (id, visit_count) = if let Some((id, count)) = existing {
            tx.execute(
                "UPDATE visitors SET visit_time = ?1, visit_count = ?2, purpose = ?3 WHERE id = \
                 ?4",
                params![visit_time, count + 1, request.purpose, id],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
            (id, count + 1)
        } else {
            tx.execute(
                "INSERT INTO visitors (id, name, agent_type, purpose, visit_time, visit_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                params![
                    request.candidate_id.as_str(),
                    request.name,
                    request.agent_type,
                    request.purpose,
                    visit_time
                ],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
            (request.candidate_id.as_str().to_string(), 1)
        };
        replace_answers(&tx, &id, &request.answers)?;
        let _ = trim_visitors_tx(&tx, request.max_records)?;
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        let visit_count = u64::try_from(visit_count)
            .map_err(|_| StoreError::Corrupt("negative visit count".to_string()))?;
        Ok(VisitOutcome::Recorded(VisitorRecord {
            id: VisitorId::new(id),
            name: request.name.clone(),
            agent_type: request.agent_type.clone(),
            purpose: request.purpose.clone(),
            visit_time: request.visit_time,
            visit_count,
            answers: request.answers.clone(),
        }))
    }

    fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<VisitorRecord>, StoreError> {
        let mut guard = self.lock_connection()?;
        let tx = guard
            .transaction()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let row = match key.agent_type() {
            Some(agent_type) => tx
                .query_row(
                    "SELECT id, name, agent_type, purpose, visit_time, visit_count FROM visitors \
                     WHERE name = ?1 AND agent_type = ?2",
                    params![key.name(), agent_type],
                    map_visitor_row,
                )
                .optional(),
            None => tx
                .query_row(
                    "SELECT id, name, agent_type, purpose, visit_time, visit_count FROM visitors \
                     WHERE name = ?1 AND agent_type IS NULL",
                    params![key.name()],
                    map_visitor_row,
                )
                .optional(),
        }
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        let record = match row {
            None => None,
            Some(row) => Some(build_visitor_record(&tx, row)?),
        };
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(record)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<VisitorRecord>, StoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::Invalid("limit out of range".to_string()))?;
        let mut guard = self.lock_connection()?;
        let tx = guard
            .transaction()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let rows = {
            let mut statement = tx
                .prepare(
                    "SELECT id, name, agent_type, purpose, visit_time, visit_count FROM visitors \
                     ORDER BY visit_time DESC, id ASC LIMIT ?1",
                )
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            let mapped = statement
                .query_map(params![limit], map_visitor_row)
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            mapped
                .collect::<Result<Vec<VisitorRow>, _>>()
                .map_err(|err| StoreError::Backend(err.to_string()))?
        };
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(build_visitor_record(&tx, row)?);
        }
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(records)
    }

    fn trim_to_capacity(&self, max_records: usize) -> Result<usize, StoreError> {
        let mut guard = self.lock_connection()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let removed = trim_visitors_tx(&tx, max_records)?;
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(removed)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock_connection()?;
        guard
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|err| StoreError::Backend(err.to_string()))
    }
}

/// Intermediate visitor row before answers are attached.
struct VisitorRow {
    /// Stored record identifier.
    id: String,
    /// Stored display name.
    name: String,
    /// Stored agent classifier.
    agent_type: Option<String>,
    /// Stored purpose text.
    purpose: Option<String>,
    /// Stored visit time in unix milliseconds.
    visit_time: i64,
    /// Stored visit count.
    visit_count: i64,
}

/// Maps a `SQLite` row into an intermediate visitor row.
fn map_visitor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VisitorRow> {
    Ok(VisitorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        agent_type: row.get(2)?,
        purpose: row.get(3)?,
        visit_time: row.get(4)?,
        visit_count: row.get(5)?,
    })
}

/// Loads answers and converts an intermediate row into a record.
fn build_visitor_record(
    tx: &Transaction<'_>,
    row: VisitorRow,
) -> Result<VisitorRecord, StoreError> {
    let answers = load_answers(tx, &row.id)?;
    let visit_count = u64::try_from(row.visit_count)
        .map_err(|_| StoreError::Corrupt(format!("invalid visit count for record {}", row.id)))?;
    Ok(VisitorRecord {
        id: VisitorId::new(row.id),
        name: row.name,
        agent_type: row.agent_type,
        purpose: row.purpose,
        visit_time: from_unix_millis(row.visit_time)?,
        visit_count,
        answers,
    })
}

/// Finds the identity row for an exact `(name, agent_type)` pair.
fn find_identity_row(
    tx: &Transaction<'_>,
    name: &str,
    agent_type: Option<&str>,
) -> Result<Option<(String, i64)>, StoreError> {
    let row = match agent_type {
        Some(agent_type) => tx
            .query_row(
                "SELECT id, visit_count FROM visitors WHERE name = ?1 AND agent_type = ?2",
                params![name, agent_type],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional(),
        None => tx
            .query_row(
                "SELECT id, visit_count FROM visitors WHERE name = ?1 AND agent_type IS NULL",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional(),
    };
    row.map_err(|err| StoreError::Backend(err.to_string()))
}

/// Replaces a visitor's answers with delete-all-then-insert-all.
fn replace_answers(
    tx: &Transaction<'_>,
    visitor_id: &str,
    answers: &AnswerMap,
) -> Result<(), StoreError> {
    tx.execute("DELETE FROM answers WHERE visitor_id = ?1", params![visitor_id])
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    for (key, value) in answers {
        tx.execute(
            "INSERT INTO answers (visitor_id, key, value) VALUES (?1, ?2, ?3)",
            params![visitor_id, key, value],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    }
    Ok(())
}

/// Loads a visitor's answers as a key/value map.
fn load_answers(tx: &Transaction<'_>, visitor_id: &str) -> Result<AnswerMap, StoreError> {
    let mut statement = tx
        .prepare("SELECT key, value FROM answers WHERE visitor_id = ?1")
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let rows = statement
        .query_map(params![visitor_id], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let mut answers = AnswerMap::new();
    for row in rows {
        let (key, value) = row.map_err(|err| StoreError::Backend(err.to_string()))?;
        answers.insert(key, value);
    }
    Ok(answers)
}

/// Deletes oldest visitors beyond the capacity ceiling inside a transaction.
fn trim_visitors_tx(tx: &Transaction<'_>, max_records: usize) -> Result<usize, StoreError> {
    let count: i64 = tx
        .query_row("SELECT COUNT(*) FROM visitors", [], |row| row.get(0))
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let max = i64::try_from(max_records)
        .map_err(|_| StoreError::Invalid("capacity out of range".to_string()))?;
    if count <= max {
        return Ok(0);
    }
    let excess = count - max;
    let removed = tx
        .execute(
            "DELETE FROM visitors WHERE id IN (SELECT id FROM visitors ORDER BY visit_time ASC, \
             id ASC LIMIT ?1)",
            params![excess],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    Ok(removed)
}

// ============================================================================
// SECTION: Feedback Store
// ============================================================================

impl FeedbackStore for SqliteStore {
    fn append(&self, record: &FeedbackRecord, max_records: usize) -> Result<(), StoreError> {
        let mut guard = self.lock_connection()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let submission_time = to_unix_millis(record.submission_time)?;
        tx.execute(
            "INSERT INTO feedback (id, agent_name, agent_type, submission_time, issues, \
             feature_requests, usability_rating, additional_comments) VALUES (?1, ?2, ?3, ?4, ?5, \
             ?6, ?7, ?8)",
            params![
                record.id.as_str(),
                record.agent_name,
                record.agent_type,
                submission_time,
                record.issues,
                record.feature_requests,
                record.usability_rating,
                record.additional_comments
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        let _ = trim_feedback_tx(&tx, max_records)?;
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::Invalid("limit out of range".to_string()))?;
        let guard = self.lock_connection()?;
        let mut statement = guard
            .prepare(
                "SELECT id, agent_name, agent_type, submission_time, issues, feature_requests, \
                 usability_rating, additional_comments FROM feedback ORDER BY submission_time \
                 DESC, id ASC LIMIT ?1",
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let rows = statement
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<u8>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let (id, agent_name, agent_type, millis, issues, features, rating, comments) =
                row.map_err(|err| StoreError::Backend(err.to_string()))?;
            records.push(FeedbackRecord {
                id: FeedbackId::new(id),
                agent_name,
                agent_type,
                submission_time: from_unix_millis(millis)?,
                issues,
                feature_requests: features,
                usability_rating: rating,
                additional_comments: comments,
            });
        }
        Ok(records)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        VisitorStore::readiness(self)
    }
}

/// Deletes oldest feedback entries beyond the capacity ceiling.
fn trim_feedback_tx(tx: &Transaction<'_>, max_records: usize) -> Result<usize, StoreError> {
    let count: i64 = tx
        .query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    let max = i64::try_from(max_records)
        .map_err(|_| StoreError::Invalid("capacity out of range".to_string()))?;
    if count <= max {
        return Ok(0);
    }
    let excess = count - max;
    let removed = tx
        .execute(
            "DELETE FROM feedback WHERE id IN (SELECT id FROM feedback ORDER BY submission_time \
             ASC, id ASC LIMIT ?1)",
            params![excess],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
    Ok(removed)
}
