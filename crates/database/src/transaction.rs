//! Append-only transaction log.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::{NewTransaction, Transaction, TransactionKind};
use crate::Result;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, kind, amount, description, reference, status, created_at";

/// Append a ledger entry. Returns its id.
pub async fn insert_transaction<'e, E>(executor: E, entry: &NewTransaction<'_>) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, kind, amount, description, reference, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.kind)
    .bind(entry.amount)
    .bind(entry.description)
    .bind(entry.reference)
    .bind(entry.status)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Recent entries for a user, newest first.
pub async fn list_user_transactions(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        SELECT {TRANSACTION_COLUMNS}
        FROM transactions
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All entries carrying a reference (order id or request id), oldest first.
pub async fn list_by_reference(pool: &SqlitePool, reference: &str) -> Result<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, Transaction>(&format!(
        r#"
        SELECT {TRANSACTION_COLUMNS}
        FROM transactions
        WHERE reference = ?
        ORDER BY id
        "#
    ))
    .bind(reference)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count a user's entries of one kind.
pub async fn count_by_kind(pool: &SqlitePool, user_id: &str, kind: TransactionKind) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM transactions
        WHERE user_id = ? AND kind = ?
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
