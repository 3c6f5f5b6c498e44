// crates/waypost-config/src/config.rs
// ============================================================================
// Module: Waypost Configuration
// Description: Configuration loading and validation for Waypost.
// Purpose: Select the storage backend and bind the HTTP surface safely.
// Dependencies: serde, thiserror, toml, waypost-store-sqlite
// ============================================================================

//! ## Overview
//! The configuration selects one of the interchangeable storage backends at
//! startup, points the content loader at a directory, and bounds the HTTP
//! surface (bind address, per-client request limiting, audit sink). Every
//! field has a default so an empty file is a valid demo configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use waypost_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Default bind address for the HTTP server.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default per-client request limit per window.
const DEFAULT_REQUEST_LIMIT: u32 = 100;
/// Default per-client request window in seconds.
const DEFAULT_REQUEST_WINDOW_SECS: u64 = 60;
/// Default content directory.
const DEFAULT_CONTENT_DIR: &str = "content";
/// Default visitor document path for the file backend.
const DEFAULT_VISITORS_PATH: &str = "data/welcome_book.json";
/// Default feedback document path for the file backend.
const DEFAULT_FEEDBACK_PATH: &str = "data/feedback.json";
/// Default database path for the sqlite backend.
const DEFAULT_SQLITE_PATH: &str = "data/waypost.db";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Model
// ============================================================================

/// Top-level Waypost configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaypostConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend selection and settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Content loader settings.
    #[serde(default)]
    pub content: ContentConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Per-client requests allowed per window; zero disables the limiter.
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,
    /// Per-client request window in seconds.
    #[serde(default = "default_request_window_secs")]
    pub request_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_limit: default_request_limit(),
            request_window_secs: default_request_window_secs(),
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Lock-guarded JSON documents (compatibility/demo mode).
    #[default]
    File,
    /// `SQLite` database (default above demo scale).
    Sqlite,
    /// In-memory store; state is lost on shutdown.
    Memory,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StoreBackend,
    /// File backend settings.
    #[serde(default)]
    pub file: FileStoreConfig,
    /// `SQLite` backend settings.
    #[serde(default = "default_sqlite_config")]
    pub sqlite: SqliteStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            file: FileStoreConfig::default(),
            sqlite: default_sqlite_config(),
        }
    }
}

/// File backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileStoreConfig {
    /// Path to the visitor JSON document.
    #[serde(default = "default_visitors_path")]
    pub visitors_path: PathBuf,
    /// Path to the feedback JSON document.
    #[serde(default = "default_feedback_path")]
    pub feedback_path: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            visitors_path: default_visitors_path(),
            feedback_path: default_feedback_path(),
        }
    }
}

/// Content loader settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    /// Directory holding `articles/` and `projects/` subdirectories.
    #[serde(default = "default_content_dir")]
    pub dir: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: default_content_dir(),
        }
    }
}

/// Audit sink selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit sink settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path; required when `sink = "file"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default per-client request limit.
const fn default_request_limit() -> u32 {
    DEFAULT_REQUEST_LIMIT
}

/// Returns the default per-client request window.
const fn default_request_window_secs() -> u64 {
    DEFAULT_REQUEST_WINDOW_SECS
}

/// Returns the default content directory.
fn default_content_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONTENT_DIR)
}

/// Returns the default visitor document path.
fn default_visitors_path() -> PathBuf {
    PathBuf::from(DEFAULT_VISITORS_PATH)
}

/// Returns the default feedback document path.
fn default_feedback_path() -> PathBuf {
    PathBuf::from(DEFAULT_FEEDBACK_PATH)
}

/// Returns the default sqlite backend settings.
fn default_sqlite_config() -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: PathBuf::from(DEFAULT_SQLITE_PATH),
        busy_timeout_ms: 5_000,
    }
}

// ============================================================================
// SECTION: Loading & Validation
// ============================================================================

impl WaypostConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "config file exceeds {MAX_CONFIG_FILE_SIZE} bytes"
            )));
        }
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self =
            toml::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let _: SocketAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind: {}", self.server.bind)))?;
        if self.server.request_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_window_secs must be greater than zero".to_string(),
            ));
        }
        match self.store.backend {
            StoreBackend::File => {
                ensure_file_path("store.file.visitors_path", &self.store.file.visitors_path)?;
                ensure_file_path("store.file.feedback_path", &self.store.file.feedback_path)?;
                if self.store.file.visitors_path == self.store.file.feedback_path {
                    return Err(ConfigError::Invalid(
                        "store.file: visitors_path and feedback_path must differ".to_string(),
                    ));
                }
            }
            StoreBackend::Sqlite => {
                ensure_file_path("store.sqlite.path", &self.store.sqlite.path)?;
            }
            StoreBackend::Memory => {}
        }
        if self.audit.sink == AuditSinkKind::File && self.audit.path.is_none() {
            return Err(ConfigError::Invalid(
                "audit.path is required when audit.sink is \"file\"".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rejects empty or directory paths for storage documents.
fn ensure_file_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    if path.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "{field} must be a file path, not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}
