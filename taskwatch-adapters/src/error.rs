//! Error types for adapters.

use taskwatch_sdk::UpstreamError;
use thiserror::Error;

/// Errors that can occur when talking to an upstream service.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Upstream answered with a non-success status.
    #[error("API returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The adapter could not be configured.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(feature = "connect")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}

impl From<AdapterError> for UpstreamError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Status(code) => UpstreamError::Status(code),
            AdapterError::Parse(msg) => UpstreamError::Decode(msg),
            other => UpstreamError::Transport(other.to_string()),
        }
    }
}
