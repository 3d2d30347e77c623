//! Dispatch error types

use hail_ledger::LedgerError;
use hail_types::PartyId;
use thiserror::Error;

/// Dispatch errors
///
/// Authentication and authorization live at this layer; everything about
/// ride state comes up from the ledger unchanged.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Not authenticated: {0} is not a registered party")]
    NotAuthenticated(PartyId),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
