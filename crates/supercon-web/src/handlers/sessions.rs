//! Session endpoints.
//! A client creates a session, submits material names to it, reads its
//! state, clears it, and finally deletes it.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use supercon_query::SessionSnapshot;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub material: String,
}

/// POST /api/sessions
pub async fn create_session(State(state): State<SharedState>) -> (StatusCode, Json<SessionCreated>) {
    let (session_id, snapshot) = state.create_session();
    (StatusCode::CREATED, Json(SessionCreated { session_id, snapshot }))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.snapshot(id)?))
}

/// POST /api/sessions/{id}/query - runs one lookup and returns the outcome.
pub async fn submit_query(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let Json(body) = body?;
    Ok(Json(state.start_query(id, &body.material).await?))
}

/// DELETE /api/sessions/{id}/result
pub async fn clear_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.clear(id)?))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.close_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}
