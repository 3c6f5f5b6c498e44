// crates/waypost-api/src/server.rs
// ============================================================================
// Module: API Server
// Description: Application state, store selection, and HTTP serving.
// Purpose: Assemble the router from configuration and run it over axum.
// Dependencies: axum, tokio, waypost-config, waypost-core, waypost-store-*
// ============================================================================

//! ## Overview
//! The server builds one [`AppState`] from configuration: registries over
//! the selected storage backend (file, sqlite, or memory), the content
//! loader, the audit sink, and the per-client limiter. Middleware applies
//! security headers to every response and runs the limiter plus request
//! auditing ahead of the handlers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use thiserror::Error;
use waypost_config::AuditSinkKind;
use waypost_config::StoreBackend;
use waypost_config::StoreConfig;
use waypost_config::WaypostConfig;
use waypost_core::FeedbackRegistry;
use waypost_core::MemoryFeedbackStore;
use waypost_core::MemoryVisitorStore;
use waypost_core::SharedFeedbackStore;
use waypost_core::SharedVisitorStore;
use waypost_core::VisitorRegistry;
use waypost_store_file::FileFeedbackStore;
use waypost_store_file::FileVisitorStore;
use waypost_store_sqlite::SqliteStore;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::RequestAuditEvent;
use crate::audit::StderrAuditSink;
use crate::content::ContentService;
use crate::limiter::RateLimitPolicy;
use crate::limiter::RequestLimiter;
use crate::routes;
use crate::routes::ErrorBody;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API server errors.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared state behind every handler.
pub(crate) struct AppState {
    /// Visitor registry over the selected backend.
    pub(crate) visitors: VisitorRegistry,
    /// Feedback registry over the selected backend.
    pub(crate) feedback: FeedbackRegistry,
    /// Markdown content loader.
    pub(crate) content: ContentService,
    /// Audit sink for request and fault events.
    pub(crate) audit: Arc<dyn AuditSink>,
    /// Per-client request limiter.
    pub(crate) limiter: RequestLimiter,
    /// Server start instant for uptime reporting.
    pub(crate) started_at: Instant,
}

#[cfg(test)]
impl AppState {
    /// Builds a state over in-memory stores for handler tests.
    pub(crate) fn in_memory() -> Self {
        Self {
            visitors: VisitorRegistry::new(Arc::new(MemoryVisitorStore::new())),
            feedback: FeedbackRegistry::new(Arc::new(MemoryFeedbackStore::new())),
            content: ContentService::new(std::path::Path::new("content")),
            audit: Arc::new(NoopAuditSink),
            limiter: RequestLimiter::new(None),
            started_at: Instant::now(),
        }
    }
}

/// Runs blocking storage work off the async reactor when possible.
pub(crate) fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

// ============================================================================
// SECTION: Store Selection
// ============================================================================

/// Builds the visitor and feedback stores selected by configuration.
///
/// # Errors
///
/// Returns [`ApiServerError::Init`] when a backend cannot be opened.
pub fn build_stores(
    config: &StoreConfig,
) -> Result<(SharedVisitorStore, SharedFeedbackStore), ApiServerError> {
    match config.backend {
        StoreBackend::File => {
            let visitors = FileVisitorStore::open(&config.file.visitors_path)
                .map_err(|err| ApiServerError::Init(err.to_string()))?;
            let feedback = FileFeedbackStore::open(&config.file.feedback_path)
                .map_err(|err| ApiServerError::Init(err.to_string()))?;
            Ok((Arc::new(visitors), Arc::new(feedback)))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.sqlite)
                .map_err(|err| ApiServerError::Init(err.to_string()))?;
            let shared = Arc::new(store);
            let visitors: SharedVisitorStore = shared.clone();
            let feedback: SharedFeedbackStore = shared;
            Ok((visitors, feedback))
        }
        StoreBackend::Memory => {
            Ok((Arc::new(MemoryVisitorStore::new()), Arc::new(MemoryFeedbackStore::new())))
        }
    }
}

/// Builds the audit sink selected by configuration.
fn build_audit_sink(config: &WaypostConfig) -> Result<Arc<dyn AuditSink>, ApiServerError> {
    match config.audit.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .audit
                .path
                .as_ref()
                .ok_or_else(|| ApiServerError::Config("audit.path required".to_string()))?;
            let sink = FileAuditSink::new(path)
                .map_err(|err| ApiServerError::Init(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// API server instance.
pub struct ApiServer {
    /// Validated configuration.
    config: WaypostConfig,
    /// Shared application state.
    state: Arc<AppState>,
}

impl ApiServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when validation or initialization fails.
    pub fn from_config(config: WaypostConfig) -> Result<Self, ApiServerError> {
        config.validate().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let (visitor_store, feedback_store) = build_stores(&config.store)?;
        let audit = build_audit_sink(&config)?;
        let limiter = RequestLimiter::new(RateLimitPolicy::from_window(
            config.server.request_limit,
            config.server.request_window_secs,
        ));
        let state = Arc::new(AppState {
            visitors: VisitorRegistry::new(visitor_store),
            feedback: FeedbackRegistry::new(feedback_store),
            content: ContentService::new(&config.content.dir),
            audit,
            limiter,
            started_at: Instant::now(),
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Assembles the router with middleware applied.
    fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::index))
            .route("/articles", get(routes::list_articles))
            .route("/articles/{slug}", get(routes::get_article))
            .route("/projects", get(routes::list_projects))
            .route("/projects/{slug}", get(routes::get_project))
            .route("/about", get(routes::about))
            .route("/welcome-book", get(routes::list_visitors).post(routes::sign_welcome_book))
            .route("/feedback", get(routes::list_feedback).post(routes::submit_feedback))
            .route("/health", get(routes::health_check))
            .layer(middleware::from_fn_with_state(Arc::clone(&self.state), guard_requests))
            .layer(middleware::from_fn(security_headers))
            .with_state(Arc::clone(&self.state))
    }

    /// Serves requests on the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .map_err(|_| ApiServerError::Config("invalid bind address".to_string()))?;
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| ApiServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ApiServerError::Transport("http server failed".to_string()))
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Applies the per-client limiter and audits every request.
async fn guard_requests(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let peer_ip = peer.ip();
    if !state.limiter.allow(peer_ip) {
        let response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                detail: "too many requests".to_string(),
            }),
        )
            .into_response();
        state.audit.record_request(&RequestAuditEvent::new(
            method,
            path,
            response.status().as_u16(),
            Some(peer_ip.to_string()),
        ));
        return response;
    }
    let response = next.run(request).await;
    state.audit.record_request(&RequestAuditEvent::new(
        method,
        path,
        response.status().as_u16(),
        Some(peer_ip.to_string()),
    ));
    response
}

/// Attaches defensive response headers.
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Content-Security-Policy", HeaderValue::from_static("default-src 'self'"));
    response
}
