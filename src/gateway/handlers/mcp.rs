use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::super::sse::session_stream;
use super::super::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct SessionQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// `GET /mcp` opens an SSE session.
pub(crate) async fn open_channel(State(state): State<AppState>) -> Response {
    let (id, outbound, guard) = state.sessions.open(state.mcp.clone());
    info!(session = %id, "SSE session opened");
    session_stream(id, outbound, guard).into_response()
}

/// `POST /mcp`: without `sessionId` opens a session like `GET`; with one,
/// queues the body for that session's worker.
pub(crate) async fn post_mcp(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> Response {
    let Some(raw_id) = query.session_id else {
        return open_channel(State(state)).await;
    };

    let sender = Uuid::parse_str(&raw_id)
        .ok()
        .and_then(|id| state.sessions.sender(&id));
    let Some(sender) = sender else {
        debug!(session = %raw_id, "message for unknown session");
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    };

    if sender.send(body).await.is_err() {
        return (StatusCode::NOT_FOUND, "Session closed").into_response();
    }
    (StatusCode::ACCEPTED, "Accepted").into_response()
}
