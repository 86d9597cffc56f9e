//! One-shot replay of the offline backlog as a text event stream.

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};
use crate::relay::ReplayOutcome;

/// `GET /offline-messages`: Drain messages buffered while no viewer was
/// attached.
///
/// Each buffered message becomes one `data: <payload>\n\n` event, oldest
/// first. Messages returned here are removed from the relay; a second call
/// only sees what arrived in between.
///
/// # Errors
///
/// Returns [`RelayError::Stopped`] if the relay is shutting down and
/// [`RelayError::Timeout`] if the coordinator does not answer in time.
#[utoipa::path(
    get,
    path = "/offline-messages",
    tag = "Feed",
    summary = "Replay offline messages",
    description = "Returns every buffered message as a text/event-stream body and evicts them.",
    responses(
        (status = 200, description = "Buffered events, oldest first", content_type = "text/event-stream", body = String),
        (status = 503, description = "Relay is stopping", body = ErrorResponse),
        (status = 504, description = "Relay did not complete the replay in time", body = ErrorResponse),
    )
)]
pub async fn offline_messages(State(state): State<AppState>) -> Result<Response, RelayError> {
    let (stream, mut events) = mpsc::unbounded_channel::<Bytes>();
    let timeout = state.config.replay_timeout;

    // Dropping `events` on timeout makes the coordinator's writes fail, so a
    // late pass still evicts what it drained.
    let outcome = tokio::time::timeout(timeout, state.relay.replay(stream))
        .await
        .map_err(|_| {
            let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            RelayError::Timeout(ms)
        })??;

    let ReplayOutcome::Completed { delivered, evicted } = outcome else {
        return Err(RelayError::Stopped);
    };
    tracing::info!(delivered, evicted, "offline messages replayed");

    let mut body = BytesMut::new();
    while let Ok(event) = events.try_recv() {
        body.extend_from_slice(&event);
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body.freeze(),
    )
        .into_response())
}

/// Replay routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/offline-messages", get(offline_messages))
}
