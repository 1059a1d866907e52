//! Error taxonomy for the dashboard transport layer.

use thiserror::Error;

/// Failure modes for a single fetch or roll submission.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never completed (DNS, connect, timeout, dropped socket).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    /// The body was not valid JSON for the expected schema.
    #[error("malformed payload: {0}")]
    Parse(String),

    /// The requested roll transition is no longer valid server-side
    /// (stale allowable set). Mapped from HTTP 409.
    #[error("transition conflict: {0}")]
    Conflict(String),
}

impl FetchError {
    /// Classify a reqwest error: decode failures are parse errors,
    /// everything else never produced a usable response.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err)
        }
    }
}
