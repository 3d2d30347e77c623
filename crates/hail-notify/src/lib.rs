//! Hail Notify - Best-effort event fan-out
//!
//! The notifier pushes event envelopes to targeted parties through their
//! directory handles and mirrors every envelope onto an observer feed.
//! Delivery is fire-and-forget: unreachable parties are skipped, dead
//! handles are reported back to the directory, and nothing here ever blocks
//! or fails a dispatch operation. Parties that miss events re-sync by
//! reading ride state; the ledger stays authoritative.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

use hail_directory::PresenceDirectory;
use hail_types::{EventEnvelope, PartyId, RideEvent};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Observer feed buffer; laggards drop old events, never block senders.
const OBSERVER_CHANNEL_CAPACITY: usize = 1024;

/// How many envelopes the replay history keeps by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Fan-out of dispatch events to parties and observers
pub struct Notifier {
    directory: Arc<PresenceDirectory>,
    observers: broadcast::Sender<EventEnvelope>,
    history: RwLock<VecDeque<EventEnvelope>>,
    history_capacity: usize,
}

impl Notifier {
    pub fn new(directory: Arc<PresenceDirectory>) -> Self {
        Self::with_history_capacity(directory, DEFAULT_HISTORY_CAPACITY)
    }

    /// A `capacity` of zero disables replay retention entirely.
    pub fn with_history_capacity(directory: Arc<PresenceDirectory>, capacity: usize) -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CHANNEL_CAPACITY);
        Self {
            directory,
            observers,
            history: RwLock::new(VecDeque::with_capacity(capacity)),
            history_capacity: capacity,
        }
    }

    /// Stamp `event` into an envelope and deliver it.
    ///
    /// Each recipient is delivered to at most once (duplicates in the slice
    /// are collapsed). Recipients without a live handle are dropped without
    /// queuing; a handle whose receiver has gone away is reported to the
    /// directory as offline. The envelope always reaches the observer feed,
    /// and the replay history when retention is enabled, even with no
    /// recipients at all.
    pub async fn notify(&self, recipients: &[PartyId], event: RideEvent) -> EventEnvelope {
        let envelope = EventEnvelope::new(event);

        let mut delivered = 0usize;
        let mut dropped = 0usize;
        let mut seen: HashSet<&PartyId> = HashSet::with_capacity(recipients.len());
        for party in recipients {
            if !seen.insert(party) {
                continue;
            }
            match self.directory.resolve_handle(party) {
                Some(handle) => {
                    if handle.send(envelope.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        self.directory.mark_offline(party);
                        dropped += 1;
                    }
                }
                None => dropped += 1,
            }
        }

        // Observer feed; no subscribers is not an error.
        let _ = self.observers.send(envelope.clone());

        debug!(
            event = envelope.kind(),
            ride = %envelope.ride_id(),
            delivered,
            dropped,
            "event dispatched"
        );

        self.record(envelope.clone()).await;
        envelope
    }

    /// Subscribe to the live feed of every envelope the notifier emits.
    pub fn observe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.observers.subscribe()
    }

    /// The most recent envelopes, oldest first, capped at `limit`.
    pub async fn recent_events(&self, limit: usize) -> Vec<EventEnvelope> {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    async fn record(&self, envelope: EventEnvelope) {
        if self.history_capacity == 0 {
            return;
        }
        let mut history = self.history.write().await;
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(envelope);
    }
}
