//! Hail Ledger - Authoritative trip state
//!
//! The ledger is the source of truth for every ride: its offers, its
//! winner, its place in the lifecycle. Two layers make that trustworthy:
//!
//! - **RideStore**: storage with atomic conditional updates per ride. The
//!   single-winner check-and-set lives here, so the guarantee holds for any
//!   caller and any backend honoring the trait contract.
//! - **TripLedger**: input validation, auditing, and queries on top of a
//!   store.
//!
//! The in-memory store is the development and test backend; a persistent
//! implementation plugs in behind the same trait.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod ledger;
pub mod store;

// Re-exports
pub use error::{LedgerError, Result};
pub use ledger::{LedgerStats, RideQuery, TripLedger};
pub use store::{InMemoryRideStore, RideStore};
