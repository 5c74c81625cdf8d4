/*
[INPUT]:  Error sources (HTTP, API, serialization, WebSocket, channel registry)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::realtime::ChannelKey;

/// Main error type for the bitFlyer adapter
#[derive(Error, Debug)]
pub enum BitflyerError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-200 status
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// Serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Realtime endpoint address could not be parsed
    #[error("Invalid endpoint address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A stream is already running for this key
    #[error("Stream already exists: {0}")]
    AlreadyExists(ChannelKey),

    /// No stream is running for this key
    #[error("Stream not found: {0}")]
    NotFound(ChannelKey),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request parameters rejected before sending
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An I/O operation exceeded its deadline
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,
}

impl BitflyerError {
    /// Check if the error is worth retrying on a fresh connection
    pub fn is_retryable(&self) -> bool {
        match self {
            BitflyerError::Http(_)
            | BitflyerError::WebSocket(_)
            | BitflyerError::Timeout { .. }
            | BitflyerError::ConnectionClosed => true,
            BitflyerError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BitflyerError::Config(_) | BitflyerError::InvalidAddress { .. }
        )
    }

    /// Create an API error from status code and body
    pub fn api_error(status: StatusCode, body: impl Into<String>) -> Self {
        BitflyerError::Api {
            status: status.as_u16(),
            body: body.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BitflyerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BitflyerError::WebSocket(err.to_string())
    }
}

/// Result type alias for bitFlyer operations
pub type Result<T> = std::result::Result<T, BitflyerError>;
