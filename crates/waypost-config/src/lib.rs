// crates/waypost-config/src/lib.rs
// ============================================================================
// Module: Waypost Config
// Description: Configuration model + validation for the Waypost server.
// Purpose: Provide strict, fail-closed TOML config parsing.
// Dependencies: serde, thiserror, toml, waypost-store-sqlite
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with defaults for every field
//! and validated before the server starts. Missing or invalid configuration
//! fails closed rather than guessing.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod config;

pub use config::AuditConfig;
pub use config::AuditSinkKind;
pub use config::ConfigError;
pub use config::ContentConfig;
pub use config::FileStoreConfig;
pub use config::ServerConfig;
pub use config::StoreBackend;
pub use config::StoreConfig;
pub use config::WaypostConfig;
