//! Axum router - maps all URL paths to handlers.

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    sessions::{clear_session, create_session, delete_session, get_session, submit_query},
    system::{examples, health},
};
use crate::sse::session_events;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    router_with_state(Arc::new(state))
}

/// Same routes over state the caller keeps a handle to.
pub fn router_with_state(shared: SharedState) -> Router {
    Router::new()
        // Sessions
        .route("/api/sessions",             post(create_session))
        .route("/api/sessions/{id}",        get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/query",  post(submit_query))
        .route("/api/sessions/{id}/result", delete(clear_session))

        // SSE streaming
        .route("/api/sessions/{id}/events", get(session_events))

        // Static data
        .route("/api/examples", get(examples))
        .route("/api/health",   get(health))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
