// crates/waypost-api/src/lib.rs
// ============================================================================
// Module: Waypost API
// Description: HTTP surface for content, visits, and feedback.
// Purpose: Route requests through the registries with validation-first
//          handlers, audit logging, and transport-level limiting.
// Dependencies: axum, serde, serde_yaml, thiserror, time, tokio, waypost-*
// ============================================================================

//! ## Overview
//! The API crate assembles the axum router over an application state built
//! from configuration: a visitor registry and feedback registry over the
//! selected storage backend, the markdown content loader, an audit sink,
//! and a per-client request limiter. Handlers translate registry errors to
//! status codes; storage causes are audited server-side and never leaked.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod content;
mod health;
mod limiter;
mod routes;
mod server;

pub use content::Article;
pub use content::ContentService;
pub use content::Project;
pub use limiter::RateLimitPolicy;
pub use limiter::RequestLimiter;
pub use server::ApiServer;
pub use server::ApiServerError;
pub use server::build_stores;
