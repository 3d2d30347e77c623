//! Live party presence tracking
//!
//! The directory is the single source of truth for who is currently on the
//! line: party kind, a handle to push events down, and (for workers) whether
//! they are open to new rides. Records survive disconnection so a returning
//! party keeps its identity; only the handle and availability change.

use crate::error::{DirectoryError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hail_types::{Availability, EventEnvelope, PartyId, PartyKind};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Handle for pushing events to a connected party.
pub type EventSender = mpsc::UnboundedSender<EventEnvelope>;

/// Internal presence record; handles never leave the directory un-cloned.
struct PresenceRecord {
    kind: PartyKind,
    availability: Availability,
    handle: Option<EventSender>,
    registered_at: DateTime<Utc>,
}

/// Serializable view of a presence record, for APIs and diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// The party
    pub party_id: PartyId,

    /// Requester or worker
    pub kind: PartyKind,

    /// Current availability
    pub availability: Availability,

    /// Whether a live handle is attached
    pub connected: bool,

    /// When the current registration happened
    pub registered_at: DateTime<Utc>,
}

/// In-memory directory of connected parties
pub struct PresenceDirectory {
    parties: DashMap<PartyId, PresenceRecord>,
}

impl PresenceDirectory {
    pub fn new() -> Self {
        Self {
            parties: DashMap::new(),
        }
    }

    /// Register a party, replacing any previous handle.
    ///
    /// Idempotent upsert: re-registration is how reconnects work. The handle
    /// is swapped and the party comes back available.
    pub fn register(&self, party_id: PartyId, kind: PartyKind, handle: EventSender) {
        self.upsert(party_id, kind, Some(handle));
    }

    /// Register a party that has no delivery stream yet.
    ///
    /// Same upsert semantics as [`register`](Self::register); the party can
    /// issue commands immediately and attaches a handle by re-registering.
    pub fn register_detached(&self, party_id: PartyId, kind: PartyKind) {
        self.upsert(party_id, kind, None);
    }

    fn upsert(&self, party_id: PartyId, kind: PartyKind, handle: Option<EventSender>) {
        debug!(party = %party_id, %kind, connected = handle.is_some(), "party registered");
        self.parties.insert(
            party_id,
            PresenceRecord {
                kind,
                availability: Availability::Available,
                handle,
                registered_at: Utc::now(),
            },
        );
    }

    /// Drop a party's handle and mark it offline. The record is retained, so
    /// the identity stays known and can issue commands or reconnect; a worker
    /// mid-ride keeps its ride.
    pub fn remove(&self, party_id: &PartyId) -> Result<()> {
        let mut record = self
            .parties
            .get_mut(party_id)
            .ok_or_else(|| DirectoryError::PartyNotFound(party_id.clone()))?;
        record.handle = None;
        record.availability = Availability::Offline;
        debug!(party = %party_id, "party removed");
        Ok(())
    }

    /// Quietly drop a handle after a failed delivery or broken connection.
    ///
    /// Unlike [`remove`](Self::remove) this never errors; stale handles can
    /// be reported from paths that have no business failing.
    pub fn mark_offline(&self, party_id: &PartyId) {
        if let Some(mut record) = self.parties.get_mut(party_id) {
            if record.handle.is_some() || record.availability != Availability::Offline {
                debug!(party = %party_id, "party marked offline");
            }
            record.handle = None;
            record.availability = Availability::Offline;
        }
    }

    /// Set a worker's availability. Rejects requesters.
    pub fn set_availability(&self, party_id: &PartyId, availability: Availability) -> Result<()> {
        let mut record = self
            .parties
            .get_mut(party_id)
            .ok_or_else(|| DirectoryError::PartyNotFound(party_id.clone()))?;
        if record.kind != PartyKind::Worker {
            return Err(DirectoryError::NotAWorker(party_id.clone()));
        }
        debug!(party = %party_id, %availability, "availability changed");
        record.availability = availability;
        Ok(())
    }

    /// Mark the winning worker busy once a ride is theirs.
    pub fn mark_busy(&self, party_id: &PartyId) -> Result<()> {
        self.set_availability(party_id, Availability::Busy)
    }

    /// Forget a party entirely. Commands from it will no longer authenticate.
    pub fn unregister(&self, party_id: &PartyId) -> Result<()> {
        self.parties
            .remove(party_id)
            .map(|_| debug!(party = %party_id, "party unregistered"))
            .ok_or_else(|| DirectoryError::PartyNotFound(party_id.clone()))
    }

    /// The registered kind of a party, if known.
    pub fn kind_of(&self, party_id: &PartyId) -> Option<PartyKind> {
        self.parties.get(party_id).map(|r| r.kind)
    }

    /// Whether the directory has ever seen this party (and not forgotten it).
    pub fn is_registered(&self, party_id: &PartyId) -> bool {
        self.parties.contains_key(party_id)
    }

    /// Whether a party has a live, unclosed handle attached.
    pub fn is_connected(&self, party_id: &PartyId) -> bool {
        self.parties
            .get(party_id)
            .and_then(|r| r.handle.as_ref().map(|h| !h.is_closed()))
            .unwrap_or(false)
    }

    /// Clone the delivery handle for a party, if one is attached.
    pub fn resolve_handle(&self, party_id: &PartyId) -> Option<EventSender> {
        self.parties.get(party_id).and_then(|r| r.handle.clone())
    }

    /// Workers that are connected and open to new rides.
    pub fn list_available_workers(&self) -> Vec<PartyId> {
        let mut workers: Vec<PartyId> = self
            .parties
            .iter()
            .filter(|entry| {
                entry.kind == PartyKind::Worker
                    && entry.availability.is_available()
                    && entry.handle.as_ref().map(|h| !h.is_closed()).unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();
        workers.sort();
        workers
    }

    /// Snapshot of a single party.
    pub fn snapshot_of(&self, party_id: &PartyId) -> Option<PresenceSnapshot> {
        self.parties.get(party_id).map(|record| PresenceSnapshot {
            party_id: party_id.clone(),
            kind: record.kind,
            availability: record.availability,
            connected: record.handle.as_ref().map(|h| !h.is_closed()).unwrap_or(false),
            registered_at: record.registered_at,
        })
    }

    /// Snapshot of every known party, sorted by ID for stable output.
    pub fn snapshot(&self) -> Vec<PresenceSnapshot> {
        let mut all: Vec<PresenceSnapshot> = self
            .parties
            .iter()
            .map(|entry| PresenceSnapshot {
                party_id: entry.key().clone(),
                kind: entry.kind,
                availability: entry.availability,
                connected: entry.handle.as_ref().map(|h| !h.is_closed()).unwrap_or(false),
                registered_at: entry.registered_at,
            })
            .collect();
        all.sort_by(|a, b| a.party_id.cmp(&b.party_id));
        all
    }
}

impl Default for PresenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}
