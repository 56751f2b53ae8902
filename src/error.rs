//! Error types for the sync layer
//!
//! Provides unified error handling using thiserror.

use serde::Deserialize;
use thiserror::Error;

/// Maximum length for raw response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

// == Fetch Error Enum ==
/// Failure of a single network round-trip.
///
/// Recorded on cache entries and handed to every subscriber, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request never produced a response
    #[error("Network failure: {0}")]
    Network(String),

    /// Non-2xx status with the server-provided message
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded
    #[error("Parse failure: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl FetchError {
    /// Builds an `Http` error from a status code and the raw response body.
    ///
    /// Uses the `error` field of a JSON body when present, otherwise the
    /// (truncated) raw body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) => truncate_body(body),
        };
        FetchError::Http { status, message }
    }

    /// Returns the HTTP status if this is an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut cut = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
}

// == Sync Error Enum ==
/// Errors raised outside the cache boundary: setup and invalid input.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid caller input (malformed base URL, bad filter, ...)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A mutation round-trip failed; no invalidation was applied
    #[error("Mutation failed: {0}")]
    Mutation(#[from] FetchError),

    /// HTTP client construction failed
    #[error("Transport setup failed: {0}")]
    Transport(String),
}

// == Result Type Alias ==
/// Convenience Result type for the sync layer.
pub type Result<T> = std::result::Result<T, SyncError>;
