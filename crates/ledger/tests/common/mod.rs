//! Shared fixtures for ledger integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use database::{balance, user, Database, Tokens};
use ledger::{LedgerConfig, Settings, SqliteSettings};
use tempfile::TempDir;

/// Fresh in-memory database with the schema applied.
pub async fn memory_db() -> Database {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();
    db
}

/// File-backed database for tests that need real write contention.
///
/// Keep the returned directory alive for the duration of the test.
pub async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("ledger.db").display());
    let db = Database::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}

/// Settings over the database with caching disabled.
pub fn settings(db: &Database) -> Settings {
    Settings::new(
        Arc::new(SqliteSettings::new(db.clone(), Duration::ZERO)),
        Arc::new(LedgerConfig::default()),
    )
}

/// Create a user holding `tokens` whole tokens.
pub async fn user_with(db: &Database, user_id: &str, tokens: i64) {
    user::get_or_create_user(db.pool(), user_id, None, None)
        .await
        .unwrap();
    if tokens > 0 {
        balance::credit(db.pool(), user_id, Tokens::whole(tokens))
            .await
            .unwrap();
    }
}

pub async fn balance_of(db: &Database, user_id: &str) -> Tokens {
    balance::balance(db.pool(), user_id).await.unwrap()
}

pub async fn checks_of(db: &Database, user_id: &str) -> i64 {
    user::get_user(db.pool(), user_id).await.unwrap().total_checks
}

/// Move a request's creation time `days` into the past.
pub async fn backdate_request(db: &Database, request_id: &str, days: i64) {
    sqlx::query("UPDATE requests SET created_at = datetime('now', ?) WHERE request_id = ?")
        .bind(format!("-{} days", days))
        .bind(request_id)
        .execute(db.pool())
        .await
        .unwrap();
}
