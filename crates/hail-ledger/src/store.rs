//! Ride storage trait and in-memory implementation
//!
//! Each mutating method is an atomic read-modify-write on a single ride
//! record: the status check and the mutation happen under one write lock,
//! so two workers racing to win the same ride can never both succeed no
//! matter how their callers interleave. A persistent backend must provide
//! the same conditional-update semantics (e.g. a transactional compare-and-
//! set on the ride row).

use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hail_types::{Offer, PartyId, Ride, RideId, RideStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage for ride records
#[async_trait]
pub trait RideStore: Send + Sync {
    /// Insert a freshly created ride.
    async fn insert_ride(&self, ride: Ride) -> Result<()>;

    /// Fetch a snapshot of a ride.
    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>>;

    /// Snapshots of every ride, in no particular order.
    async fn list_rides(&self) -> Result<Vec<Ride>>;

    /// Append an offer to a ride that is still pending.
    ///
    /// Fails if the ride is unknown, has left `pending`, or already carries
    /// an offer from the same worker. Returns the updated ride.
    async fn append_offer(&self, ride_id: &RideId, offer: Offer) -> Result<Ride>;

    /// The single-winner check-and-set.
    ///
    /// If and only if the ride is still pending and `worker` has an offer on
    /// it: that offer is marked won, all siblings lost, the ride moves to
    /// `accepted` and the timestamp is stamped, atomically. A ride that
    /// already has a winner reports `RideAlreadyAccepted`; one cancelled
    /// before any winner reports `RideNotPending`.
    async fn settle_acceptance(
        &self,
        ride_id: &RideId,
        worker: &PartyId,
        at: DateTime<Utc>,
    ) -> Result<Ride>;

    /// Apply a validated lifecycle transition and stamp its timestamp.
    ///
    /// Cancelling a ride that never found a winner marks its open offers
    /// lost. Returns the updated ride.
    async fn apply_transition(
        &self,
        ride_id: &RideId,
        to: RideStatus,
        at: DateTime<Utc>,
    ) -> Result<Ride>;
}

/// In-memory ride store for development and testing
#[derive(Debug, Default)]
pub struct InMemoryRideStore {
    rides: RwLock<HashMap<RideId, Ride>>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self {
            rides: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RideStore for InMemoryRideStore {
    async fn insert_ride(&self, ride: Ride) -> Result<()> {
        let mut rides = self.rides.write().await;
        rides.insert(ride.ride_id, ride);
        Ok(())
    }

    async fn get_ride(&self, ride_id: &RideId) -> Result<Option<Ride>> {
        let rides = self.rides.read().await;
        Ok(rides.get(ride_id).cloned())
    }

    async fn list_rides(&self) -> Result<Vec<Ride>> {
        let rides = self.rides.read().await;
        Ok(rides.values().cloned().collect())
    }

    async fn append_offer(&self, ride_id: &RideId, offer: Offer) -> Result<Ride> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or(LedgerError::RideNotFound(*ride_id))?;

        if ride.status != RideStatus::Pending {
            return Err(LedgerError::RideNotPending {
                ride_id: *ride_id,
                status: ride.status,
            });
        }
        if ride.offer_by_worker(&offer.worker).is_some() {
            return Err(LedgerError::DuplicateOffer {
                ride_id: *ride_id,
                worker: offer.worker.clone(),
            });
        }

        ride.offers.push(offer);
        Ok(ride.clone())
    }

    async fn settle_acceptance(
        &self,
        ride_id: &RideId,
        worker: &PartyId,
        at: DateTime<Utc>,
    ) -> Result<Ride> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or(LedgerError::RideNotFound(*ride_id))?;

        if ride.winning_offer.is_some() {
            return Err(LedgerError::RideAlreadyAccepted(*ride_id));
        }
        if ride.status != RideStatus::Pending {
            return Err(LedgerError::RideNotPending {
                ride_id: *ride_id,
                status: ride.status,
            });
        }
        let winner = ride
            .offer_by_worker(worker)
            .map(|o| o.offer_id)
            .ok_or_else(|| {
                LedgerError::InvalidRequest(format!(
                    "worker {} has no offer on ride {}",
                    worker, ride_id
                ))
            })?;

        ride.settle_offers(&winner);
        ride.transition(RideStatus::Accepted, at);
        Ok(ride.clone())
    }

    async fn apply_transition(
        &self,
        ride_id: &RideId,
        to: RideStatus,
        at: DateTime<Utc>,
    ) -> Result<Ride> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or(LedgerError::RideNotFound(*ride_id))?;

        let from = ride.status;
        if !ride.transition(to, at) {
            return Err(LedgerError::InvalidTransition {
                ride_id: *ride_id,
                from,
                to,
            });
        }
        if to == RideStatus::Cancelled && ride.winning_offer.is_none() {
            ride.void_offers();
        }
        Ok(ride.clone())
    }
}
