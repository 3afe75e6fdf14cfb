//! Server-Sent Events (SSE) streaming of session state changes.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /api/sessions/{id}/events - snapshots of one session as it changes.
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // 404 for unknown sessions instead of an idle stream
    state.snapshot(id)?;

    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(move |result| {
            result.ok()
                .filter(|event| event.session_id() == id)
                .and_then(|event| {
                    serde_json::to_string(&event).ok().map(|data| {
                        Ok(Event::default().event(event.name()).data(data))
                    })
                })
        });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
