//! Error types for ledger operations.

use database::{DatabaseError, Tokens, ValidationError};
use provider_core::GatewayError;
use thiserror::Error;

/// Errors surfaced by the ledger.
///
/// Lookup-path failures after a debit are not errors: they end up as a
/// terminal request status plus a refund (see [`crate::LookupOutcome`]).
/// `Storage` is the one variant callers must treat as fatal.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The feature, or every lookup, is switched off.
    #[error("{0} is under maintenance")]
    MaintenanceActive(String),

    /// Balance does not cover the price.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Tokens, available: Tokens },

    /// No provider is registered for the feature.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    /// Deposit or adjustment amount rejected.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Promo code missing, inactive, expired, used up or below its minimum.
    #[error("invalid promo code: {0}")]
    InvalidPromo(String),

    /// The user already has a referrer.
    #[error("user already referred")]
    AlreadyReferred,

    /// Unknown code or self-referral.
    #[error("invalid referral: {0}")]
    InvalidReferral(String),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the record.
    #[error("not allowed: {0}")]
    Forbidden(String),

    /// Payment gateway call failed; nothing was persisted.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    /// Rejected input.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The ledger itself could not be read or written.
    #[error("storage error: {0}")]
    Storage(DatabaseError),
}

impl From<DatabaseError> for LedgerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(DatabaseError::Sqlx(err))
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
