//! Matchmaking route handlers: join, event stream, pool size.

use crate::api::error::ApiError;
use crate::api::ApiState;
use crate::types::{JoinRequest, MatchResult, QueueUpdate};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// `POST /matchmaking/join`: enroll the caller and try to pair them.
pub async fn join(
    State(state): State<ApiState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<MatchResult>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let player_id = request.player_id.clone();

    let result = state.coordinator.enroll(request).await.map_err(|e| {
        warn!("Join request failed - player_id: '{}', error: {}", player_id, e);
        ApiError::from(e)
    })?;

    debug!(
        "Join request completed - player_id: '{}', outcome: {}",
        player_id,
        result.outcome()
    );
    Ok(Json(result))
}

/// `GET /matchmaking/queue`: current pool size.
pub async fn queue_size(State(state): State<ApiState>) -> Result<Json<QueueUpdate>, ApiError> {
    let total = state.coordinator.pool_size().await?;
    Ok(Json(QueueUpdate { total }))
}

/// `GET /matchmaking/events`: server-sent stream of `queueUpdate` and
/// `matchFound` events published after the client connected.
pub async fn events(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.events.subscribe();
    info!(
        "Event stream opened ({} subscribers)",
        state.events.receiver_count()
    );

    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => match event.payload_json() {
            Ok(data) => Some(Ok(Event::default().event(event.name()).data(data))),
            Err(e) => {
                warn!("Failed to encode {} for event stream: {}", event.name(), e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Event stream subscriber lagged, {} events dropped", skipped);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
