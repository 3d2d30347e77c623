//! Event types for the dispatch notification stream
//!
//! Every interesting lifecycle moment becomes a `RideEvent`, wrapped in an
//! `EventEnvelope` when it leaves the engine. Delivery is best-effort; the
//! ride record in the ledger stays authoritative regardless of who saw what.

use crate::{Offer, PartyId, RideId, RideStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    /// Informational event
    Info,
    /// Something a party probably wants to react to
    Warning,
}

/// Dispatch lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RideEvent {
    /// A requester opened a new ride
    #[serde(rename = "ride.created")]
    Created {
        ride_id: RideId,
        requester: PartyId,
        pickup: String,
        dropoff: String,
    },

    /// A worker attached an offer to a pending ride
    #[serde(rename = "ride.offer.received")]
    OfferReceived { ride_id: RideId, offer: Offer },

    /// The requester accepted an offer; sent to the winner and the requester
    #[serde(rename = "ride.accepted")]
    Accepted {
        ride_id: RideId,
        offer: Offer,
        pickup: String,
        dropoff: String,
    },

    /// The ride went to somebody else; sent to each losing worker
    #[serde(rename = "ride.taken")]
    Taken { ride_id: RideId },

    /// The ride advanced along its lifecycle
    #[serde(rename = "ride.status.changed")]
    StatusChanged {
        ride_id: RideId,
        from: RideStatus,
        to: RideStatus,
        changed_at: DateTime<Utc>,
    },

    /// The ride was cancelled
    #[serde(rename = "ride.cancelled")]
    Cancelled {
        ride_id: RideId,
        cancelled_by: PartyId,
    },
}

impl RideEvent {
    /// Stable dotted name, matching the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            RideEvent::Created { .. } => "ride.created",
            RideEvent::OfferReceived { .. } => "ride.offer.received",
            RideEvent::Accepted { .. } => "ride.accepted",
            RideEvent::Taken { .. } => "ride.taken",
            RideEvent::StatusChanged { .. } => "ride.status.changed",
            RideEvent::Cancelled { .. } => "ride.cancelled",
        }
    }

    /// The ride this event concerns.
    pub fn ride_id(&self) -> &RideId {
        match self {
            RideEvent::Created { ride_id, .. }
            | RideEvent::OfferReceived { ride_id, .. }
            | RideEvent::Accepted { ride_id, .. }
            | RideEvent::Taken { ride_id }
            | RideEvent::StatusChanged { ride_id, .. }
            | RideEvent::Cancelled { ride_id, .. } => ride_id,
        }
    }
}

/// Envelope wrapping an event for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub event_id: Uuid,

    /// When the engine emitted the event
    pub occurred_at: DateTime<Utc>,

    /// Event severity
    pub severity: EventSeverity,

    /// The actual event
    pub event: RideEvent,
}

impl EventEnvelope {
    /// Stamp an event with an ID, timestamp and inferred severity.
    pub fn new(event: RideEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            severity: Self::infer_severity(&event),
            event,
        }
    }

    /// The ride this envelope concerns.
    pub fn ride_id(&self) -> &RideId {
        self.event.ride_id()
    }

    /// Stable dotted event name, for logging and SSE event framing.
    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }

    fn infer_severity(event: &RideEvent) -> EventSeverity {
        match event {
            RideEvent::Cancelled { .. } => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}
