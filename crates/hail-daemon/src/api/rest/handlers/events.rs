//! Event feed handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use hail_types::{EventEnvelope, RideId};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

/// Get events query params
#[derive(Debug, Deserialize)]
pub struct GetEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub ride_id: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// Recent event envelopes, oldest first
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<GetEventsQuery>,
) -> ApiResult<Json<Vec<EventEnvelope>>> {
    let mut events = state.engine.notifier().recent_events(usize::MAX).await;

    if let Some(raw) = &query.ride_id {
        let ride_id = parse_ride_id(raw)?;
        events.retain(|envelope| envelope.ride_id() == &ride_id);
    }

    let skip = events.len().saturating_sub(query.limit);
    Ok(Json(events.split_off(skip)))
}

/// Stream every event envelope via SSE
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine.notifier().observe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(envelope) => {
                let json = serde_json::to_string(&envelope).unwrap_or_default();
                Some((Ok(Event::default().data(json)), rx))
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                // Observer fell behind; skip ahead to live events
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Helper to parse a ride ID from either form
fn parse_ride_id(id: &str) -> ApiResult<RideId> {
    RideId::parse(id).ok_or_else(|| ApiError::BadRequest(format!("Invalid ride ID: {}", id)))
}
