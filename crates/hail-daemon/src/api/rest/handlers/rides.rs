//! Ride lifecycle handlers: requests, offers, arbitration and progress

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use hail_ledger::{LedgerError, RideQuery};
use hail_types::{Offer, PartyId, Ride, RideId, RideStatus};
use serde::Deserialize;

/// Request body for opening a ride
#[derive(Debug, Deserialize)]
pub struct RequestRideRequest {
    pub requester: String,
    pub pickup: String,
    pub dropoff: String,
}

/// Open a new ride and advertise it to available workers
pub async fn request_ride(
    State(state): State<AppState>,
    Json(request): Json<RequestRideRequest>,
) -> ApiResult<Json<Ride>> {
    let requester = parse_party_id(&request.requester)?;
    let ride = state
        .engine
        .request_ride(&requester, &request.pickup, &request.dropoff)
        .await?;
    Ok(Json(ride))
}

/// List rides matching a query
pub async fn list_rides(
    State(state): State<AppState>,
    Query(query): Query<RideQuery>,
) -> ApiResult<Json<Vec<Ride>>> {
    Ok(Json(state.engine.list_rides(&query).await?))
}

/// Get a single ride
pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ride>> {
    let ride_id = parse_ride_id(&id)?;
    let ride = state
        .engine
        .get_ride(&ride_id)
        .await?
        .ok_or(ApiError::from(LedgerError::RideNotFound(ride_id)))?;
    Ok(Json(ride))
}

/// Request body for submitting an offer
#[derive(Debug, Deserialize)]
pub struct SubmitOfferRequest {
    pub worker: String,
    pub price: u64,
    pub eta_minutes: u32,
}

/// Submit a worker's offer on a pending ride
pub async fn submit_offer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SubmitOfferRequest>,
) -> ApiResult<Json<Offer>> {
    let ride_id = parse_ride_id(&id)?;
    let worker = parse_party_id(&request.worker)?;
    let offer = state
        .engine
        .submit_offer(&worker, &ride_id, request.price, request.eta_minutes)
        .await?;
    Ok(Json(offer))
}

/// Request body for accepting an offer
#[derive(Debug, Deserialize)]
pub struct AcceptOfferRequest {
    pub requester: String,
    pub worker: String,
}

/// Accept one worker's offer; rivals get `RideAlreadyAccepted`
pub async fn accept_offer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AcceptOfferRequest>,
) -> ApiResult<Json<Ride>> {
    let ride_id = parse_ride_id(&id)?;
    let requester = parse_party_id(&request.requester)?;
    let worker = parse_party_id(&request.worker)?;
    let ride = state
        .engine
        .accept_offer(&requester, &ride_id, &worker)
        .await?;
    Ok(Json(ride))
}

/// Request body for advancing ride status
#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub worker: String,
    pub status: RideStatus,
}

/// Advance an accepted ride to `picked_up` or `completed`
pub async fn advance_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AdvanceStatusRequest>,
) -> ApiResult<Json<Ride>> {
    let ride_id = parse_ride_id(&id)?;
    let worker = parse_party_id(&request.worker)?;
    let ride = state
        .engine
        .advance_status(&worker, &ride_id, request.status)
        .await?;
    Ok(Json(ride))
}

/// Request body for cancelling a ride
#[derive(Debug, Deserialize)]
pub struct CancelRideRequest {
    pub actor: String,
}

/// Cancel a ride from any non-terminal state
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRideRequest>,
) -> ApiResult<Json<Ride>> {
    let ride_id = parse_ride_id(&id)?;
    let actor = parse_party_id(&request.actor)?;
    let ride = state.engine.cancel_ride(&actor, &ride_id).await?;
    Ok(Json(ride))
}

/// Helper to parse a ride ID from either form
fn parse_ride_id(id: &str) -> ApiResult<RideId> {
    RideId::parse(id).ok_or_else(|| ApiError::BadRequest(format!("Invalid ride ID: {}", id)))
}

/// Helper to validate a caller-supplied party ID
fn parse_party_id(id: &str) -> ApiResult<PartyId> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("party ID must not be empty".into()));
    }
    Ok(PartyId::new(trimmed))
}
