//! Deposit orders.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{Deposit, DepositStatus, NewDeposit, PaymentMethod};

const DEPOSIT_COLUMNS: &str = "id, user_id, amount, token_amount, status, payment_method, \
    order_id, pay_ref, checkout_url, expires_at, approved_by, promo_id, promo_code, \
    promo_bonus, created_at, updated_at";

/// Insert a pending deposit. Returns its id.
pub async fn insert_deposit(pool: &SqlitePool, deposit: &NewDeposit<'_>) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO deposits (
            user_id, amount, token_amount, payment_method, order_id,
            pay_ref, checkout_url, expires_at, promo_id, promo_code, promo_bonus
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(deposit.user_id)
    .bind(deposit.amount)
    .bind(deposit.token_amount)
    .bind(deposit.payment_method)
    .bind(deposit.order_id)
    .bind(deposit.pay_ref)
    .bind(deposit.checkout_url)
    .bind(deposit.expires_at)
    .bind(deposit.promo_id)
    .bind(deposit.promo_code)
    .bind(deposit.promo_bonus)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::unique_or(e, "Deposit", deposit.order_id))?;

    Ok(result.last_insert_rowid())
}

/// Get a deposit by id.
pub async fn get_deposit<'e, E>(executor: E, id: i64) -> Result<Deposit>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Deposit>(&format!(
        "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Deposit", id))
}

/// Get a deposit by gateway order id.
pub async fn get_deposit_by_order_id(pool: &SqlitePool, order_id: &str) -> Result<Deposit> {
    sqlx::query_as::<_, Deposit>(&format!(
        "SELECT {DEPOSIT_COLUMNS} FROM deposits WHERE order_id = ?"
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Deposit", order_id))
}

/// All pending deposits, newest first.
pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<Deposit>> {
    let rows = sqlx::query_as::<_, Deposit>(&format!(
        r#"
        SELECT {DEPOSIT_COLUMNS}
        FROM deposits
        WHERE status = 'pending'
        ORDER BY id DESC
        "#
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Pending deposits paid through the gateway, oldest first.
pub async fn list_pending_by_method(
    pool: &SqlitePool,
    method: PaymentMethod,
) -> Result<Vec<Deposit>> {
    let rows = sqlx::query_as::<_, Deposit>(&format!(
        r#"
        SELECT {DEPOSIT_COLUMNS}
        FROM deposits
        WHERE status = 'pending' AND payment_method = ?
        ORDER BY id
        "#
    ))
    .bind(method)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Move a deposit out of `pending`.
///
/// Compare-and-swap on status: returns `false` when the deposit was no
/// longer pending, in which case nothing changed.
pub async fn transition_from_pending<'e, E>(
    executor: E,
    id: i64,
    to: DepositStatus,
    approved_by: Option<&str>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE deposits
        SET status = ?,
            approved_by = COALESCE(?, approved_by),
            updated_at = datetime('now')
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(to)
    .bind(approved_by)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Recent deposits for a user, newest first.
pub async fn list_user_deposits(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Deposit>> {
    let rows = sqlx::query_as::<_, Deposit>(&format!(
        r#"
        SELECT {DEPOSIT_COLUMNS}
        FROM deposits
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
