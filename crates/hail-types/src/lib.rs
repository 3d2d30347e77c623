//! Hail Types - Core types for ride dispatch and negotiation
//!
//! Hail is a real-time dispatch engine: requesters post rides, workers bid
//! on them with offers, and the engine arbitrates a single winner per ride
//! before walking it through a linear lifecycle.
//!
//! ## Architectural Boundaries
//!
//! - **hail-types** owns: The data model (rides, offers, presence, events)
//! - **hail-ledger** owns: Authoritative ride state and transition rules
//! - **hail-directory** owns: Live party connections and availability
//! - **hail-dispatch** owns: Authorization and orchestration across the above
//!
//! ## Key Concepts
//!
//! - **Ride**: A pickup/dropoff request and its full negotiation record
//! - **Offer**: A worker's bid (price, ETA) on a pending ride
//! - **RideStatus**: Linear lifecycle with cancellation from any live state
//! - **RideEvent**: Best-effort notification stream of lifecycle moments

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod events;
pub mod ids;
pub mod presence;
pub mod ride;

// Re-export main types
pub use events::{EventEnvelope, EventSeverity, RideEvent};
pub use ids::{OfferId, PartyId, RideId};
pub use presence::{Availability, PartyKind};
pub use ride::{Offer, OfferOutcome, Ride, RideStatus};
