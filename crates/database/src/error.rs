//! Database error types.

use thiserror::Error;

/// Errors that can occur during ledger storage operations.
///
/// Any of these reaching the engine means the ledger itself could not be
/// read or written, so callers escalate rather than retry.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, constraint, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
}

impl DatabaseError {
    /// Convert a unique-constraint violation into `AlreadyExists`.
    pub(crate) fn unique_or(e: sqlx::Error, entity: &'static str, id: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity,
                    id: id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
