//! Adapter construction errors and transport error classification.

use provider_core::LookupError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors building an adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The URL template is unusable.
    #[error("invalid URL template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Classify a transport error. Timeouts and connection failures are worth
/// retrying; anything else is not.
pub(crate) fn from_transport(err: reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Timeout
    } else if err.is_connect() || err.is_request() {
        LookupError::transient(err.to_string())
    } else if err.is_decode() {
        LookupError::permanent(format!("unreadable response: {}", err))
    } else {
        LookupError::transient(err.to_string())
    }
}

/// Classify a non-2xx status: 5xx and 429 are transient.
pub(crate) fn from_status(status: StatusCode) -> LookupError {
    let message = format!("HTTP {}", status);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        LookupError::transient(message)
    } else {
        LookupError::permanent(message)
    }
}
