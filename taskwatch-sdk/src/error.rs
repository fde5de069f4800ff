//! Error types for upstream calls and poll cycles.

use thiserror::Error;

/// Failure of a single call to the upstream API.
///
/// Transport failures and non-success status codes are kept distinct so
/// that logs can tell a dead endpoint from a misbehaving one, even though
/// the poller treats both the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-2xx status code.
    #[error("status code {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Reason a poll cycle was abandoned.
///
/// Every variant is cycle-fatal: nothing from the failed cycle is published
/// and the error stays recorded until a later cycle succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// Listing the monitored jobs failed.
    #[error("listing connectors: {0}")]
    List(#[source] UpstreamError),

    /// Fetching the task states of one job failed.
    #[error("getting status for connector {job}: {source}")]
    Status {
        /// Job whose status call failed.
        job: String,
        /// Underlying upstream failure.
        #[source]
        source: UpstreamError,
    },

    /// A listed job reported no tasks at all.
    #[error("no tasks for connector {job}")]
    EmptyTasks {
        /// Job that reported zero tasks.
        job: String,
    },
}

impl PollError {
    /// The job the failure is attributed to, if any.
    pub fn job(&self) -> Option<&str> {
        match self {
            PollError::List(_) => None,
            PollError::Status { job, .. } | PollError::EmptyTasks { job } => Some(job),
        }
    }

    /// The upstream failure underneath, if this was a failed call.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            PollError::List(source) | PollError::Status { source, .. } => Some(source),
            PollError::EmptyTasks { .. } => None,
        }
    }
}
