//! Transport errors and their classification into user-facing error kinds

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`Transport`](crate::transport::Transport)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Service refused the request because too many were sent (429)
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },
    /// Non-success HTTP status other than 429
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Request timeout: {0}")]
    Timeout(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    /// Response body or stream event could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// Stream or connection closed unexpectedly
    #[error("Channel closed unexpectedly")]
    Closed,
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Build an error from a non-success status and its response body.
    ///
    /// A `retry_after` hint (seconds) in a JSON error body is kept for 429s.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 429 {
            let retry_after = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|parsed| {
                    parsed
                        .get("error")
                        .and_then(|e| e.get("retry_after"))
                        .or_else(|| parsed.get("retry_after"))
                        .and_then(serde_json::Value::as_f64)
                })
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            return TransportError::RateLimited { retry_after };
        }
        TransportError::Status {
            status,
            message: body.to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::from_status(status.as_u16(), &e.to_string())
        } else if e.is_decode() || e.is_body() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Closed set of error kinds surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Too many requests; do not retry immediately, log in instead
    RateLimited,
    /// Network-level failure; a retry may succeed
    Connectivity,
    /// Anything else
    Generic,
}

impl ErrorKind {
    /// Whether retrying the same action right away may succeed.
    ///
    /// Only guidance for the operator; nothing in this crate retries.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Connectivity)
    }
}

/// The call that failed, which picks the wording of the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateConversation,
    RefreshConversation,
    FetchActiveModel,
    Stream,
}

/// A surfaced error: kind plus human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorState {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ErrorState {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Prompt submitted before any model was known
    pub fn no_active_model() -> Self {
        Self::new(
            ErrorKind::Generic,
            "No model is available yet. Start a new conversation and try again.",
        )
    }
}

pub const RATE_LIMITED_MESSAGE: &str =
    "You've sent too many requests. Please try logging in before sending a message.";
pub const CONNECTIVITY_MESSAGE: &str =
    "Couldn't reach the server. Check your internet connection and try again.";
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Map a transport failure onto the closed set of error kinds
pub fn classify_kind(error: &TransportError) -> ErrorKind {
    match error {
        TransportError::RateLimited { .. } | TransportError::Status { status: 429, .. } => {
            ErrorKind::RateLimited
        }
        TransportError::Timeout(_) | TransportError::Connection(_) | TransportError::Closed => {
            ErrorKind::Connectivity
        }
        TransportError::Status { .. } | TransportError::Decode(_) | TransportError::Other(_) => {
            ErrorKind::Generic
        }
    }
}

/// Classify a failure of `operation` into the error surfaced to the user.
///
/// Setup calls (creation, refresh, model fetch) word generic failures as a
/// connectivity problem since they carry no user content.
pub fn classify(error: &TransportError, operation: Operation) -> ErrorState {
    let kind = classify_kind(error);
    let detail = match (kind, operation) {
        (ErrorKind::RateLimited, _) => RATE_LIMITED_MESSAGE,
        (ErrorKind::Connectivity, _) => CONNECTIVITY_MESSAGE,
        (ErrorKind::Generic, Operation::CreateConversation) => {
            "Something's wrong. Check your internet connection and try again."
        }
        (ErrorKind::Generic, Operation::RefreshConversation) => {
            "Uh oh, something's not right! Please check your connection and try again later."
        }
        (ErrorKind::Generic, Operation::FetchActiveModel) => {
            "Hmm, that didn't go as planned. Please check your connection and try again."
        }
        (ErrorKind::Generic, Operation::Stream) => GENERIC_MESSAGE,
    };
    ErrorState::new(kind, detail)
}
