//! Pull-client error types.

use crate::domain::SnapshotError;

/// Errors from the request/response fallback.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend refused our credentials
    #[error("unauthorized")]
    Unauthorized,

    /// Backend returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// The fetched snapshot failed validation
    #[error("rejected snapshot: {0}")]
    Rejected(#[from] SnapshotError),

    /// The configured base URL cannot be used
    #[error("invalid base URL {url}: {message}")]
    BaseUrl { url: String, message: String },
}
