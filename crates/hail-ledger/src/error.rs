//! Ledger error types

use hail_types::{PartyId, RideId, RideStatus};
use thiserror::Error;

/// Ledger errors
///
/// Every variant is client-visible and non-fatal; callers surface them
/// synchronously and never retry on the engine's behalf.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ride not found: {0}")]
    RideNotFound(RideId),

    #[error("Ride {ride_id} is not open for offers (status: {status})")]
    RideNotPending {
        ride_id: RideId,
        status: RideStatus,
    },

    #[error("Ride {0} has already been accepted")]
    RideAlreadyAccepted(RideId),

    #[error("Worker {worker} already has an offer on ride {ride_id}")]
    DuplicateOffer { ride_id: RideId, worker: PartyId },

    #[error("Invalid offer: {0}")]
    InvalidOffer(String),

    #[error("Invalid transition for ride {ride_id}: {from} -> {to}")]
    InvalidTransition {
        ride_id: RideId,
        from: RideStatus,
        to: RideStatus,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backend failure from a durable [`RideStore`](crate::store::RideStore).
    /// The in-memory store never produces this.
    #[error("Storage error: {0}")]
    Store(String),
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
