//! Strongly-typed identifiers for Hail entities
//!
//! Ride and offer IDs are UUID-based but wrapped in newtype structs for type
//! safety. Party IDs are caller-supplied strings minted by whatever identity
//! layer fronts the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RideId(Uuid);

impl RideId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from either a bare UUID or the `ride:<uuid>` display form.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("ride:").unwrap_or(s);
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ride:{}", self.0)
    }
}

/// Unique identifier for an offer on a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(Uuid);

impl OfferId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from either a bare UUID or the `offer:<uuid>` display form.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("offer:").unwrap_or(s);
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer:{}", self.0)
    }
}

/// Identifier for a party (requester or worker) known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PartyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_id_generation() {
        let id1 = RideId::generate();
        let id2 = RideId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_ride_id_display() {
        let id = RideId::generate();
        let display = format!("{}", id);
        assert!(display.starts_with("ride:"));
    }

    #[test]
    fn test_ride_id_parse_roundtrip() {
        let id = RideId::generate();
        assert_eq!(RideId::parse(&id.to_string()), Some(id));
        assert_eq!(RideId::parse(&id.as_uuid().to_string()), Some(id));
        assert_eq!(RideId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_offer_id_parse_roundtrip() {
        let id = OfferId::generate();
        assert_eq!(OfferId::parse(&id.to_string()), Some(id));
        assert_eq!(OfferId::parse(&id.as_uuid().to_string()), Some(id));
    }

    #[test]
    fn test_party_id_display_is_bare() {
        let id = PartyId::new("rider-7");
        assert_eq!(id.to_string(), "rider-7");
        assert_eq!(id.as_str(), "rider-7");
    }
}
