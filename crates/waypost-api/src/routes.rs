// crates/waypost-api/src/routes.rs
// ============================================================================
// Module: API Routes
// Description: Request handlers and error mapping for the HTTP surface.
// Purpose: Translate HTTP requests into registry and content operations.
// Dependencies: axum, serde, serde_json, waypost-core
// ============================================================================

//! ## Overview
//! Handlers are thin: extract, delegate to a registry or the content loader,
//! map errors. Validation and rate-limit rejections surface as 400 with a
//! message naming the constraint; storage faults are audited server-side and
//! collapse to a generic 500.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use waypost_core::FeedbackRecord;
use waypost_core::FeedbackSubmission;
use waypost_core::RegistryError;
use waypost_core::VisitSubmission;
use waypost_core::VisitorRecord;

use crate::audit::StorageFaultAuditEvent;
use crate::content::Article;
use crate::content::Project;
use crate::health;
use crate::health::HealthReport;
use crate::server::AppState;
use crate::server::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of records returned by list endpoints.
const DEFAULT_LIST_LIMIT: usize = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// JSON error body returned with every non-2xx response.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    /// Human-readable failure description.
    pub(crate) detail: String,
}

/// Handler-level errors mapped onto HTTP status codes.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// Malformed or oversized input (400).
    Validation(String),
    /// Cooldown rejection (400).
    RateLimited(String),
    /// Unknown resource (404).
    NotFound(String),
    /// Storage fault, already audited (500).
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Validation(message) | Self::RateLimited(message) => {
                (StatusCode::BAD_REQUEST, message)
            }
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an unexpected error occurred; please try again later".to_string(),
            ),
        };
        (
            status,
            Json(ErrorBody {
                detail,
            }),
        )
            .into_response()
    }
}

/// Maps a registry error, auditing storage faults before collapsing them.
fn map_registry_error(state: &AppState, operation: &'static str, err: RegistryError) -> ApiError {
    match err {
        RegistryError::Validation(message) => ApiError::Validation(message),
        RegistryError::RateLimited => ApiError::RateLimited(err.to_string()),
        RegistryError::Store(message) => {
            state
                .audit
                .record_storage_fault(&StorageFaultAuditEvent::new(operation, message));
            ApiError::Internal
        }
    }
}

// ============================================================================
// SECTION: Query Parameters
// ============================================================================

/// Limit query accepted by list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    /// Maximum records to return; clamped by the registry.
    pub(crate) limit: Option<usize>,
}

/// Query accepted by the article listing.
#[derive(Debug, Deserialize)]
pub(crate) struct ArticleQuery {
    /// Category filter.
    pub(crate) category: Option<String>,
    /// Maximum entries to return.
    pub(crate) limit: Option<usize>,
}

// ============================================================================
// SECTION: Index & About
// ============================================================================

/// `GET /` — API index and caller guidance.
pub(crate) async fn index() -> Json<Value> {
    Json(json!({
        "info": {
            "name": "Waypost Agent API",
            "description": "A machine-readable interface for agents to read site content, \
                            sign the welcome book, and leave feedback",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "site_map": {
            "/": "This index",
            "/articles": "Browse articles in JSON form",
            "/projects": "Browse projects in JSON form",
            "/about": "Service information",
            "/welcome-book": "Sign the welcome book to record your visit",
            "/feedback": "Leave feedback about this API",
            "/health": "Liveness report",
        },
        "guidance": {
            "start_here": [
                "Sign the welcome book at /welcome-book to record your visit.",
                "Repeat visits under the same name are limited to one per hour.",
            ],
            "welcome_book": {
                "method": "POST",
                "required_fields": ["name"],
                "optional_fields": ["agent_type", "purpose", "answers"],
            },
        },
    }))
}

/// `GET /about` — static service information.
pub(crate) async fn about() -> Json<Value> {
    Json(json!({
        "name": "Waypost",
        "description": "A small content and feedback API built for programmatic callers.",
        "contact": {
            "website": "https://waypost.example",
        },
    }))
}

// ============================================================================
// SECTION: Content
// ============================================================================

/// `GET /articles` — list articles, optionally filtered by category.
pub(crate) async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Json<Vec<Article>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(state.content.articles(query.category.as_deref(), limit))
}

/// `GET /articles/{slug}` — fetch a single article.
pub(crate) async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Article>, ApiError> {
    state
        .content
        .article(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no article found for slug: {slug}")))
}

/// `GET /projects` — list projects.
pub(crate) async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Project>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Json(state.content.projects(limit))
}

/// `GET /projects/{slug}` — fetch a single project.
pub(crate) async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .content
        .project(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no project found for slug: {slug}")))
}

// ============================================================================
// SECTION: Welcome Book
// ============================================================================

/// `GET /welcome-book` — list recent visitors.
pub(crate) async fn list_visitors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<VisitorRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    run_blocking(|| state.visitors.list_visitors(limit))
        .map(Json)
        .map_err(|err| map_registry_error(&state, "list_visitors", err))
}

/// `POST /welcome-book` — register a visit.
pub(crate) async fn sign_welcome_book(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<VisitSubmission>,
) -> Result<Json<VisitorRecord>, ApiError> {
    run_blocking(|| state.visitors.register_visit(&submission))
        .map(Json)
        .map_err(|err| map_registry_error(&state, "register_visit", err))
}

// ============================================================================
// SECTION: Feedback
// ============================================================================

/// `GET /feedback` — list recent feedback.
pub(crate) async fn list_feedback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    run_blocking(|| state.feedback.list_feedback(limit))
        .map(Json)
        .map_err(|err| map_registry_error(&state, "list_feedback", err))
}

/// `POST /feedback` — submit feedback.
pub(crate) async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<Json<FeedbackRecord>, ApiError> {
    run_blocking(|| state.feedback.submit_feedback(&submission))
        .map(Json)
        .map_err(|err| map_registry_error(&state, "submit_feedback", err))
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// `GET /health` — liveness report.
pub(crate) async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(run_blocking(|| health::build_report(&state)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::sync::Arc;

    use axum::Json;
    use axum::extract::Path;
    use axum::extract::Query;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use waypost_core::VisitSubmission;

    use super::ApiError;
    use super::LimitQuery;
    use super::health_check;
    use super::list_visitors;
    use super::sign_welcome_book;
    use crate::server::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::in_memory())
    }

    fn submission(name: &str) -> VisitSubmission {
        VisitSubmission {
            name: name.to_string(),
            agent_type: None,
            purpose: None,
            answers: None,
        }
    }

    #[tokio::test]
    async fn sign_then_list_round_trips() {
        let state = test_state();
        let Json(record) =
            sign_welcome_book(State(Arc::clone(&state)), Json(submission("Ada"))).await.unwrap();
        assert_eq!(record.visit_count, 1);
        let Json(listed) = list_visitors(
            State(state),
            Query(LimitQuery {
                limit: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);
    }

    #[tokio::test]
    async fn immediate_resubmission_maps_to_bad_request() {
        let state = test_state();
        let _ = sign_welcome_book(State(Arc::clone(&state)), Json(submission("Ada")))
            .await
            .unwrap();
        let err = sign_welcome_book(State(state), Json(submission("Ada"))).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validation_failure_maps_to_bad_request() {
        let state = test_state();
        let err = sign_welcome_book(State(state), Json(submission(" "))).await.unwrap_err();
        let ApiError::Validation(message) = err else {
            panic!("expected a validation error");
        };
        assert!(message.contains("name"));
    }

    #[tokio::test]
    async fn missing_article_maps_to_not_found() {
        let state = test_state();
        let err = super::get_article(State(state), Path("absent".to_string())).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ready_stores() {
        let state = test_state();
        let Json(report) = health_check(State(state)).await;
        assert_eq!(report.status, "healthy");
        assert_eq!(report.store.visitors, "ready");
        assert_eq!(report.store.feedback, "ready");
    }
}
