//! Error types for the payment gateway adapter.

use thiserror::Error;

/// Errors outside the [`PaymentGateway`](provider_core::PaymentGateway)
/// calls themselves: configuration and webhook handling.
#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Webhook signature missing or wrong.
    #[error("invalid webhook signature: {0}")]
    Signature(&'static str),

    /// Webhook body is not the expected JSON.
    #[error("invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
}
