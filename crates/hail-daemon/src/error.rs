//! Error types for the dispatch daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hail_directory::DirectoryError;
use hail_dispatch::DispatchError;
use hail_ledger::LedgerError;
use hail_types::PartyId;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup or runtime error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: unparseable IDs, bad parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Party unknown to the presence directory
    #[error("Unknown party: {0}")]
    PartyNotFound(PartyId),

    /// Domain error surfaced by the dispatch engine
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Dispatch(err.into())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::PartyNotFound(party) => ApiError::PartyNotFound(party),
            DirectoryError::NotAWorker(party) => ApiError::Dispatch(DispatchError::NotAuthorized(
                format!("{} is not a worker", party),
            )),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PartyNotFound(_) => (StatusCode::NOT_FOUND, "PARTY_NOT_FOUND"),
            ApiError::Dispatch(err) => dispatch_code(err),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

fn dispatch_code(err: &DispatchError) -> (StatusCode, &'static str) {
    match err {
        DispatchError::NotAuthenticated(_) => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
        DispatchError::NotAuthorized(_) => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED"),
        DispatchError::Ledger(err) => ledger_code(err),
    }
}

fn ledger_code(err: &LedgerError) -> (StatusCode, &'static str) {
    match err {
        LedgerError::RideNotFound(_) => (StatusCode::NOT_FOUND, "RIDE_NOT_FOUND"),
        LedgerError::RideNotPending { .. } => (StatusCode::CONFLICT, "RIDE_NOT_PENDING"),
        LedgerError::RideAlreadyAccepted(_) => (StatusCode::CONFLICT, "RIDE_ALREADY_ACCEPTED"),
        LedgerError::DuplicateOffer { .. } => (StatusCode::CONFLICT, "DUPLICATE_OFFER"),
        LedgerError::InvalidOffer(_) => (StatusCode::BAD_REQUEST, "INVALID_OFFER"),
        LedgerError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        LedgerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        LedgerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
