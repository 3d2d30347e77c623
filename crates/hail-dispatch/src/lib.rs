//! Hail Dispatch - The negotiation engine
//!
//! This crate wires the ledger, directory and notifier into the command
//! surface the outside world talks to: request a ride, bid on it, accept
//! exactly one bid, drive the trip to completion or cancel it.
//!
//! The engine's one hard promise is single-winner arbitration: no matter
//! how many accept commands race on a ride, at most one worker ever wins
//! it, and every loser is told so explicitly. See
//! [`DispatchEngine::accept_offer`](engine::DispatchEngine::accept_offer).

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod engine;
pub mod error;

// Re-exports
pub use engine::DispatchEngine;
pub use error::{DispatchError, Result};
