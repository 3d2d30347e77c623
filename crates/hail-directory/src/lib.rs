//! Hail Directory - Live party presence and availability
//!
//! The directory answers three questions the rest of the engine keeps asking:
//!
//! - **Who is connected?** Registration attaches a delivery handle per party.
//! - **Which workers can take a ride?** Availability tracking with the
//!   busy/available/offline distinction.
//! - **How do I reach this party?** Handle resolution for the notifier.
//!
//! Presence is deliberately in-memory: a handle is a live channel into a
//! connection task, and has no meaningful persistent form.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod directory;
pub mod error;

// Re-exports
pub use directory::{EventSender, PresenceDirectory, PresenceSnapshot};
pub use error::{DirectoryError, Result};
