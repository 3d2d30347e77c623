//! Presence handlers: registration, availability and per-party streams

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use hail_directory::PresenceSnapshot;
use hail_types::{Availability, PartyId, PartyKind};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;

/// Request body for party registration
#[derive(Debug, Deserialize)]
pub struct RegisterPartyRequest {
    pub party_id: String,
    pub kind: PartyKind,
}

/// Register a party without a delivery stream.
///
/// Idempotent upsert: re-registering an existing party replaces its record.
/// The party can issue commands right away and attaches a stream by
/// connecting to its stream endpoint.
pub async fn register_party(
    State(state): State<AppState>,
    Json(request): Json<RegisterPartyRequest>,
) -> ApiResult<Json<PresenceSnapshot>> {
    let party_id = parse_party_id(&request.party_id)?;
    let directory = state.engine.directory();

    directory.register_detached(party_id.clone(), request.kind);
    tracing::info!(party = %party_id, kind = %request.kind, "Registered party");

    let snapshot = directory
        .snapshot_of(&party_id)
        .ok_or_else(|| ApiError::PartyNotFound(party_id.clone()))?;
    Ok(Json(snapshot))
}

/// List every known party
pub async fn list_parties(State(state): State<AppState>) -> Json<Vec<PresenceSnapshot>> {
    Json(state.engine.directory().snapshot())
}

/// Get a single party's presence snapshot
pub async fn get_party(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PresenceSnapshot>> {
    let party_id = parse_party_id(&id)?;
    let snapshot = state
        .engine
        .directory()
        .snapshot_of(&party_id)
        .ok_or(ApiError::PartyNotFound(party_id))?;
    Ok(Json(snapshot))
}

/// Take a party off the line.
///
/// The record is retained so the identity stays known; only the delivery
/// handle is dropped and the party shows as offline.
pub async fn remove_party(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PresenceSnapshot>> {
    let party_id = parse_party_id(&id)?;
    let directory = state.engine.directory();

    directory.remove(&party_id)?;
    tracing::info!(party = %party_id, "Removed party");

    let snapshot = directory
        .snapshot_of(&party_id)
        .ok_or(ApiError::PartyNotFound(party_id))?;
    Ok(Json(snapshot))
}

/// Request body for availability updates
#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub availability: Availability,
}

/// Set a worker's availability
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetAvailabilityRequest>,
) -> ApiResult<Json<PresenceSnapshot>> {
    let party_id = parse_party_id(&id)?;
    state
        .engine
        .set_availability(&party_id, request.availability)?;

    let snapshot = state
        .engine
        .directory()
        .snapshot_of(&party_id)
        .ok_or(ApiError::PartyNotFound(party_id))?;
    Ok(Json(snapshot))
}

/// Query params for stream connections
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub kind: Option<PartyKind>,
}

/// Connect a party's event stream.
///
/// Connecting is registration: the directory swaps in a fresh delivery
/// handle and the party comes back available. `kind` must be declared the
/// first time a party is seen; reconnections reuse the registered kind.
pub async fn party_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let party_id = parse_party_id(&id)?;
    let directory = state.engine.directory();

    let kind = query
        .kind
        .or_else(|| directory.kind_of(&party_id))
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "party {} is unknown; a first connection must declare kind",
                party_id
            ))
        })?;

    let (tx, rx) = mpsc::unbounded_channel();
    directory.register(party_id.clone(), kind, tx);
    tracing::info!(party = %party_id, %kind, "Party stream connected");

    // The stream ends when the directory drops the sender, i.e. when the
    // party re-registers or is forgotten.
    let stream = stream::unfold(rx, |mut rx| async move {
        let envelope = rx.recv().await?;
        let json = serde_json::to_string(&envelope).unwrap_or_default();
        Some((Ok(Event::default().data(json)), rx))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

/// Helper to validate a caller-supplied party ID
fn parse_party_id(id: &str) -> ApiResult<PartyId> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("party ID must not be empty".into()));
    }
    Ok(PartyId::new(trimmed))
}
