//! Error types for the ZetaTrade SDK
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for ZetaTrade operations
///
/// This enum encompasses all possible errors that can occur during
/// login, REST calls, request signing, and streaming-channel operation.
#[derive(Error, Debug)]
pub enum ZetaError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// API misuse: an operation was called in a state that forbids it
    /// (e.g. `complete_login` before `initiate_login`, `subscribe` before
    /// `connect`). Raised synchronously, before any I/O.
    #[error("Misuse: {0}")]
    Misuse(String),

    /// Streaming transport failure (websocket error or unexpected close).
    /// Terminal for the streaming session; callers must reconnect.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed inbound frame or delta script. Most anomalies are logged
    /// and dropped inside the engine; this variant surfaces the ones that
    /// reach a caller (e.g. a frame handed to the codec directly).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Non-2xx REST response, carrying status, status text, and body
    #[error("API request failed: {status} {status_text}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
        /// Raw response body text
        body: String,
    },

    /// Request signing failure (key import, ECDSA signing)
    #[error("Signing error: {0}")]
    Signing(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ZetaError {
    /// Returns `true` when this error is an API failure with the given
    /// status code. Convenient for callers that implement their own
    /// re-login policy on 401.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, ZetaError::Api { status, .. } if *status == code)
    }
}

/// Result type alias for ZetaTrade operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
