//! Setup Error Types
//!
//! Errors raised while constructing a transport pipeline. Failures of
//! individual requests are never reported here: they are normalized into
//! [`EnhancedError`](crate::normalizer::EnhancedError).

use thiserror::Error;

/// Errors that can occur when building the transport
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is malformed or not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The underlying HTTP client could not be created
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for transport construction
pub type Result<T> = std::result::Result<T, ClientError>;
