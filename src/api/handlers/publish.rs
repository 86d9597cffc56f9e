//! Publish handler: pushes a JSON value onto the upstream feed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;

use crate::api::dto::{PublishRequest, PublishResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RelayError};

/// `POST /publish`: Publish a message to the upstream feed.
///
/// The message reaches viewers the same way any other upstream message
/// does: through the subscription, not directly through the relay.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for an empty subject,
/// [`RelayError::UpstreamUnavailable`] if no upstream connection exists, and
/// [`RelayError::Upstream`] if publishing fails.
#[utoipa::path(
    post,
    path = "/api/v1/publish",
    tag = "Feed",
    summary = "Publish to the upstream feed",
    description = "Encodes `data` as JSON and publishes it on `subject` (or the relayed subject).",
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Published", body = PublishResponse),
        (status = 400, description = "Invalid subject", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 503, description = "No upstream connection", body = ErrorResponse),
    )
)]
pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let subject = req
        .subject
        .unwrap_or_else(|| state.config.upstream_subject.clone());
    if subject.trim().is_empty() || subject.contains(char::is_whitespace) {
        return Err(RelayError::InvalidRequest(format!(
            "invalid subject {subject:?}"
        )));
    }

    let payload = serde_json::to_vec(&req.data)
        .map_err(|e| RelayError::Internal(format!("failed to encode data: {e}")))?;
    let bytes = payload.len();

    let Some(feed) = state.publisher.as_ref() else {
        return Err(RelayError::UpstreamUnavailable);
    };
    feed.publish(&subject, Bytes::from(payload)).await?;

    Ok((
        StatusCode::OK,
        Json(PublishResponse {
            message: "ok".to_string(),
            subject,
            bytes,
        }),
    ))
}

/// Feed routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/publish", post(publish))
}
