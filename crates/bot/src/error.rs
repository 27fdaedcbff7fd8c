//! Error types for the chat front end.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while handling chat traffic.
#[derive(Debug, Error)]
pub enum BotError {
    /// Ledger operation failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Message sending failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Inbound payload could not be read.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Webhook signature missing or wrong.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl From<database::DatabaseError> for BotError {
    fn from(err: database::DatabaseError) -> Self {
        BotError::Ledger(err.into())
    }
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let status = match &self {
            BotError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BotError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BotError::Ledger(LedgerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            BotError::Ledger(LedgerError::Storage(err)) => {
                tracing::error!("Storage error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            BotError::Ledger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BotError::SendFailed(msg) => {
                tracing::error!("Send failed: {}", msg);
                StatusCode::BAD_GATEWAY
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
