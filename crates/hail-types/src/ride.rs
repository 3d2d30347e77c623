//! Ride and offer types
//!
//! A Ride is the unit of negotiation: a requester posts it, workers attach
//! offers while it is pending, and exactly one offer can win. After the win
//! the ride walks a linear lifecycle to completion, with cancellation allowed
//! from any non-terminal state.

use crate::{OfferId, PartyId, RideId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ride lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    /// Open for offers, no winner chosen yet
    Pending,

    /// An offer was accepted; the winning worker is on the way
    Accepted,

    /// The winning worker has picked the requester up
    PickedUp,

    /// The ride finished normally
    Completed,

    /// The ride was abandoned before completion
    Cancelled,
}

impl RideStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// The forward path is strictly linear (pending -> accepted -> picked_up
    /// -> completed); cancellation is reachable from every non-terminal
    /// state. Everything else, including self-loops, is rejected.
    pub fn can_transition_to(&self, next: RideStatus) -> bool {
        match (self, next) {
            (RideStatus::Pending, RideStatus::Accepted) => true,
            (RideStatus::Accepted, RideStatus::PickedUp) => true,
            (RideStatus::PickedUp, RideStatus::Completed) => true,
            (from, RideStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::PickedUp => "picked_up",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of an offer from the worker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferOutcome {
    /// Ride is still open; the offer may yet win
    Pending,

    /// This offer was accepted
    Won,

    /// Another offer was accepted, or the ride left the pending state
    Lost,
}

/// A worker's bid on a pending ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    /// Unique offer identifier
    pub offer_id: OfferId,

    /// Ride this offer is attached to
    pub ride_id: RideId,

    /// Worker who submitted the offer
    pub worker: PartyId,

    /// Quoted fare in minor currency units (e.g. cents)
    pub price: u64,

    /// Estimated minutes until pickup
    pub eta_minutes: u32,

    /// When the engine received the offer
    pub submitted_at: DateTime<Utc>,

    /// Current outcome
    pub outcome: OfferOutcome,
}

impl Offer {
    pub fn new(ride_id: RideId, worker: PartyId, price: u64, eta_minutes: u32) -> Self {
        Self {
            offer_id: OfferId::generate(),
            ride_id,
            worker,
            price,
            eta_minutes,
            submitted_at: Utc::now(),
            outcome: OfferOutcome::Pending,
        }
    }
}

/// A ride request and its full negotiation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    /// Unique ride identifier
    pub ride_id: RideId,

    /// Party that requested the ride
    pub requester: PartyId,

    /// Free-form pickup location
    pub pickup: String,

    /// Free-form dropoff location
    pub dropoff: String,

    /// Current lifecycle status
    pub status: RideStatus,

    /// All offers received, in submission order
    pub offers: Vec<Offer>,

    /// The accepted offer, once one wins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_offer: Option<OfferId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When an offer was accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,

    /// When the requester was picked up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<DateTime<Utc>>,

    /// When the ride completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// When the ride was cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ride {
    /// Open a fresh pending ride with no offers.
    pub fn new(requester: PartyId, pickup: impl Into<String>, dropoff: impl Into<String>) -> Self {
        Self {
            ride_id: RideId::generate(),
            requester,
            pickup: pickup.into(),
            dropoff: dropoff.into(),
            status: RideStatus::Pending,
            offers: Vec::new(),
            winning_offer: None,
            created_at: Utc::now(),
            accepted_at: None,
            picked_up_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Look up an offer by ID.
    pub fn offer(&self, offer_id: &OfferId) -> Option<&Offer> {
        self.offers.iter().find(|o| &o.offer_id == offer_id)
    }

    /// Look up the offer a given worker submitted, if any.
    pub fn offer_by_worker(&self, worker: &PartyId) -> Option<&Offer> {
        self.offers.iter().find(|o| &o.worker == worker)
    }

    /// The accepted offer, resolved against the offer list.
    pub fn winning(&self) -> Option<&Offer> {
        self.winning_offer.as_ref().and_then(|id| self.offer(id))
    }

    /// The worker whose offer won, if one has.
    pub fn winning_worker(&self) -> Option<&PartyId> {
        self.winning().map(|o| &o.worker)
    }

    /// Workers that have an offer attached to this ride.
    pub fn offering_workers(&self) -> Vec<PartyId> {
        self.offers.iter().map(|o| o.worker.clone()).collect()
    }

    /// Apply a lifecycle transition, stamping the matching timestamp.
    ///
    /// Returns `false` without mutating anything when the lifecycle does not
    /// permit the move; callers turn that into their own error type.
    pub fn transition(&mut self, to: RideStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(to) {
            return false;
        }
        self.status = to;
        match to {
            RideStatus::Accepted => self.accepted_at = Some(at),
            RideStatus::PickedUp => self.picked_up_at = Some(at),
            RideStatus::Completed => self.completed_at = Some(at),
            RideStatus::Cancelled => self.cancelled_at = Some(at),
            RideStatus::Pending => {}
        }
        true
    }

    /// Mark `winner` as won and every other offer as lost.
    ///
    /// Does not touch `status`; pairing this with a `transition` to
    /// `Accepted` is the ledger's job.
    pub fn settle_offers(&mut self, winner: &OfferId) {
        for offer in &mut self.offers {
            offer.outcome = if &offer.offer_id == winner {
                OfferOutcome::Won
            } else {
                OfferOutcome::Lost
            };
        }
        self.winning_offer = Some(*winner);
    }

    /// Mark every offer as lost, for rides cancelled before a winner emerged.
    pub fn void_offers(&mut self) {
        for offer in &mut self.offers {
            if offer.outcome == OfferOutcome::Pending {
                offer.outcome = OfferOutcome::Lost;
            }
        }
    }

    /// Cross-field consistency check used by tests and storage audits.
    pub fn check_invariants(&self) -> Result<(), String> {
        let won: Vec<&Offer> = self
            .offers
            .iter()
            .filter(|o| o.outcome == OfferOutcome::Won)
            .collect();
        if won.len() > 1 {
            return Err(format!("{} offers marked won", won.len()));
        }
        match (&self.winning_offer, won.first()) {
            (Some(id), Some(offer)) if &offer.offer_id != id => {
                return Err(format!(
                    "winning_offer {} does not match won offer {}",
                    id, offer.offer_id
                ));
            }
            (Some(id), None) => {
                return Err(format!("winning_offer {} has no won offer backing it", id));
            }
            (None, Some(offer)) => {
                return Err(format!("offer {} won but winning_offer is unset", offer.offer_id));
            }
            _ => {}
        }
        if self.status == RideStatus::Pending && self.winning_offer.is_some() {
            return Err("pending ride cannot have a winner".to_string());
        }
        if matches!(
            self.status,
            RideStatus::Accepted | RideStatus::PickedUp | RideStatus::Completed
        ) && self.winning_offer.is_none()
        {
            return Err(format!("{} ride has no winning offer", self.status));
        }
        for offer in &self.offers {
            if offer.ride_id != self.ride_id {
                return Err(format!(
                    "offer {} belongs to ride {}",
                    offer.offer_id, offer.ride_id
                ));
            }
        }
        Ok(())
    }
}
