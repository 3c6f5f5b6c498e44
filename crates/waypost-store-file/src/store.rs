// crates/waypost-store-file/src/store.rs
// ============================================================================
// Module: File Store Implementations
// Description: JSON-document visitor and feedback stores.
// Purpose: Implement the core store contracts over flat files with flock
//          semantics.
// Dependencies: fs2, serde_json, waypost-core
// ============================================================================

//! ## Overview
//! The on-disk layout is a single JSON array of record objects with answers
//! as nested objects and timestamps as ISO-8601 strings. Every write re-reads
//! the whole document under an exclusive lock, applies the reference logic
//! from `waypost-core`, and rewrites the file in place before the lock is
//! released — there is no partial update.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use fs2::FileExt;
use waypost_core::FeedbackRecord;
use waypost_core::FeedbackStore;
use waypost_core::IdentityKey;
use waypost_core::StoreError;
use waypost_core::VisitOutcome;
use waypost_core::VisitRequest;
use waypost_core::VisitorRecord;
use waypost_core::VisitorStore;
use waypost_core::apply_visit_to_records;
use waypost_core::trim_oldest_feedback;
use waypost_core::trim_oldest_visitors;

// ============================================================================
// SECTION: Document Helpers
// ============================================================================

/// Ensures the document file exists, seeding it with an empty array.
fn ensure_document(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
    }
    if !path.exists() {
        fs::write(path, b"[]").map_err(|err| StoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Reads and parses the whole document while holding a shared lock.
fn read_document<T>(path: &Path) -> Result<Vec<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    let file = File::open(path).map_err(|err| StoreError::Io(err.to_string()))?;
    FileExt::lock_shared(&file).map_err(|err| StoreError::Io(err.to_string()))?;
    let result = parse_records(&file);
    let _ = FileExt::unlock(&file);
    result
}

/// Parses the record array from an open, locked document.
fn parse_records<T>(mut file: &File) -> Result<Vec<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    let mut contents = String::new();
    file.read_to_string(&mut contents).map_err(|err| StoreError::Io(err.to_string()))?;
    serde_json::from_str(&contents).map_err(|err| StoreError::Corrupt(err.to_string()))
}

/// Rewrites an open, locked document with the provided records.
fn rewrite_records<T>(mut file: &File, records: &[T]) -> Result<(), StoreError>
where
    T: serde::Serialize,
{
    let payload =
        serde_json::to_vec_pretty(records).map_err(|err| StoreError::Invalid(err.to_string()))?;
    file.set_len(0).map_err(|err| StoreError::Io(err.to_string()))?;
    file.seek(SeekFrom::Start(0)).map_err(|err| StoreError::Io(err.to_string()))?;
    file.write_all(&payload).map_err(|err| StoreError::Io(err.to_string()))?;
    file.flush().map_err(|err| StoreError::Io(err.to_string()))
}

/// Runs a read-modify-write over the document under an exclusive lock.
fn with_exclusive_document<T, R>(
    path: &Path,
    mutate: impl FnOnce(&mut Vec<T>) -> R,
) -> Result<R, StoreError>
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| StoreError::Io(err.to_string()))?;
    FileExt::lock_exclusive(&file).map_err(|err| StoreError::Io(err.to_string()))?;
    let result: Result<R, StoreError> = (|| {
        let mut records = parse_records(&file)?;
        let output = mutate(&mut records);
        rewrite_records(&file, &records)?;
        Ok(output)
    })();
    let _ = FileExt::unlock(&file);
    result
}

// ============================================================================
// SECTION: Visitor Store
// ============================================================================

/// File-backed visitor store.
///
/// # Invariants
/// - The exclusive lock spans the whole read-modify-write of every mutation,
///   so concurrent same-identity submissions can never both insert.
/// - The document always holds a complete JSON array; partial writes are not
///   possible while the lock is held.
#[derive(Debug, Clone)]
pub struct FileVisitorStore {
    /// Path to the JSON document.
    path: PathBuf,
}

impl FileVisitorStore {
    /// Opens a file-backed visitor store, creating the document if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the document cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        ensure_document(&path)?;
        Ok(Self {
            path,
        })
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VisitorStore for FileVisitorStore {
    fn apply_visit(&self, request: &VisitRequest) -> Result<VisitOutcome, StoreError> {
        with_exclusive_document(&self.path, |records: &mut Vec<VisitorRecord>| {
            apply_visit_to_records(records, request)
        })
    }

    fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<VisitorRecord>, StoreError> {
        let records: Vec<VisitorRecord> = read_document(&self.path)?;
        Ok(records
            .into_iter()
            .find(|record| key.matches(&record.name, record.agent_type.as_deref())))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<VisitorRecord>, StoreError> {
        let mut records: Vec<VisitorRecord> = read_document(&self.path)?;
        records.sort_by(|a, b| b.visit_time.cmp(&a.visit_time));
        records.truncate(limit);
        Ok(records)
    }

    fn trim_to_capacity(&self, max_records: usize) -> Result<usize, StoreError> {
        with_exclusive_document(&self.path, |records: &mut Vec<VisitorRecord>| {
            trim_oldest_visitors(records, max_records)
        })
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let _: Vec<VisitorRecord> = read_document(&self.path)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Feedback Store
// ============================================================================

/// File-backed feedback store.
#[derive(Debug, Clone)]
pub struct FileFeedbackStore {
    /// Path to the JSON document.
    path: PathBuf,
}

impl FileFeedbackStore {
    /// Opens a file-backed feedback store, creating the document if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the document cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        ensure_document(&path)?;
        Ok(Self {
            path,
        })
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedbackStore for FileFeedbackStore {
    fn append(&self, record: &FeedbackRecord, max_records: usize) -> Result<(), StoreError> {
        with_exclusive_document(&self.path, |records: &mut Vec<FeedbackRecord>| {
            records.push(record.clone());
            let _ = trim_oldest_feedback(records, max_records);
        })
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
        let mut records: Vec<FeedbackRecord> = read_document(&self.path)?;
        records.sort_by(|a, b| b.submission_time.cmp(&a.submission_time));
        records.truncate(limit);
        Ok(records)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let _: Vec<FeedbackRecord> = read_document(&self.path)?;
        Ok(())
    }
}
