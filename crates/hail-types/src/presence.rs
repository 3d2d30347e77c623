//! Party classification and availability
//!
//! Who a party is (requester or worker) and whether a worker can currently
//! take rides. The live connection handles themselves are owned by the
//! presence directory, not by these types.

use serde::{Deserialize, Serialize};

/// Role a party plays in the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    /// Posts rides and accepts offers
    Requester,

    /// Submits offers and drives accepted rides
    Worker,
}

impl std::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PartyKind::Requester => "requester",
            PartyKind::Worker => "worker",
        };
        write!(f, "{}", s)
    }
}

/// Availability of a worker for new rides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Connected and open to offers
    Available,

    /// Connected but committed to a ride
    Busy,

    /// No live connection
    Offline,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Availability::Offline)
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Availability::Available => "available",
            Availability::Busy => "busy",
            Availability::Offline => "offline",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_predicates() {
        assert!(Availability::Available.is_available());
        assert!(!Availability::Busy.is_available());
        assert!(Availability::Busy.is_connected());
        assert!(!Availability::Offline.is_connected());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&PartyKind::Requester).unwrap(),
            "\"requester\""
        );
        assert_eq!(
            serde_json::to_string(&Availability::Offline).unwrap(),
            "\"offline\""
        );
    }
}
