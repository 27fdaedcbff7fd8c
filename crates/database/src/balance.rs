//! Single-statement balance mutations.
//!
//! Each function is one `UPDATE`, so it is atomic on its own and can also be
//! run inside a caller's transaction. Functions that return `bool` report
//! whether a row was changed; `false` means the guard did not hold.

use sqlx::{Executor, Sqlite};

use crate::error::{DatabaseError, Result};
use crate::tokens::Tokens;

/// Take `amount` for a lookup and count the check.
///
/// Guarded: only succeeds when the balance covers the amount, so concurrent
/// debits can never push a balance below zero.
pub async fn debit<'e, E>(executor: E, user_id: &str, amount: Tokens) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET token_balance = token_balance - ?1,
            total_checks = total_checks + 1,
            updated_at = datetime('now')
        WHERE user_id = ?2 AND token_balance >= ?1
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Give back `amount` taken by [`debit`].
///
/// With `undo_check` the check counter is decremented too, restoring the
/// exact pre-debit state; a partial refund keeps the check counted.
pub async fn refund<'e, E>(
    executor: E,
    user_id: &str,
    amount: Tokens,
    undo_check: bool,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET token_balance = token_balance + ?,
            total_checks = total_checks - ?,
            updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(amount)
    .bind(i64::from(undo_check))
    .bind(user_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }

    Ok(())
}

/// Add `amount` without touching the check counter.
pub async fn credit<'e, E>(executor: E, user_id: &str, amount: Tokens) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET token_balance = token_balance + ?,
            updated_at = datetime('now')
        WHERE user_id = ?
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", user_id));
    }

    Ok(())
}

/// Remove `amount` without touching the check counter (admin reductions).
///
/// Guarded like [`debit`].
pub async fn deduct<'e, E>(executor: E, user_id: &str, amount: Tokens) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE users
        SET token_balance = token_balance - ?1,
            updated_at = datetime('now')
        WHERE user_id = ?2 AND token_balance >= ?1
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Read the current balance.
pub async fn balance<'e, E>(executor: E, user_id: &str) -> Result<Tokens>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, Tokens>(
        r#"
        SELECT token_balance FROM users WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::not_found("User", user_id))
}
