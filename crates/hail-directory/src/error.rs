//! Directory error types

use hail_types::PartyId;
use thiserror::Error;

/// Directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Party not found: {0}")]
    PartyNotFound(PartyId),

    #[error("Party is not a worker: {0}")]
    NotAWorker(PartyId),
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, DirectoryError>;
