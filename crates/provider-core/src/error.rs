//! Error types for collaborator calls.

use thiserror::Error;

/// Why a lookup produced no billable data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The provider answered but found nothing for the query.
    #[error("no data found: {0}")]
    Empty(String),

    /// The provider call failed.
    ///
    /// `transient` marks network-level failures worth retrying.
    #[error("provider failed: {message}")]
    Failed { message: String, transient: bool },

    /// The call did not finish within its time limit.
    #[error("provider timed out")]
    Timeout,
}

impl LookupError {
    /// A failure worth retrying (connection reset, 5xx, etc.).
    pub fn transient(message: impl Into<String>) -> Self {
        LookupError::Failed {
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that retrying won't fix (bad key, rejected query, etc.).
    pub fn permanent(message: impl Into<String>) -> Self {
        LookupError::Failed {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether a retry could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LookupError::Timeout | LookupError::Failed { transient: true, .. }
        )
    }
}

/// Errors from a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The gateway could not be reached or returned a server error.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway refused the request.
    #[error("gateway rejected request: {0}")]
    Rejected(String),

    /// The gateway answered with something we could not parse.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}
