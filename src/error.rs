//! Error types for the profile-driven HTTP client.
//!
//! All fallible operations in this crate return [`Result`], whose error type is
//! [`ClientError`]. Transport failures coming from the network layer are carried
//! through [`ClientError::Http`] without being retried or reshaped; retry policy
//! belongs to the caller.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced by the client registry, the stage chain and the dispatcher.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable profile was available when a client had to be built.
    ///
    /// This is a programming error: the registry never substitutes a default.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure reported by the HTTP stack.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A request or base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header name or value was rejected.
    #[error("Header error: {0}")]
    Header(String),

    /// The on-disk response cache failed.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Body (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-zero business code inside a response envelope.
    #[error("API error {code}: {message}")]
    Api {
        /// Business error code reported by the server.
        code: i64,
        /// Message that accompanied the code.
        message: String,
    },
}

impl ClientError {
    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Io(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ClientError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        ClientError::Header(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ClientError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        ClientError::Header(err.to_string())
    }
}
