//! Promo codes and their redemptions.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{NewPromo, PromoCode, PromoUsage};

const PROMO_COLUMNS: &str = "id, code, bonus_percent, min_deposit, max_uses, current_uses, \
    expires_at, is_active, created_by, created_at";

/// Create a promo code. The code is stored upper-cased.
pub async fn create_promo(pool: &SqlitePool, promo: &NewPromo<'_>) -> Result<PromoCode> {
    let code = promo.code.trim().to_uppercase();
    let created = sqlx::query_as::<_, PromoCode>(&format!(
        r#"
        INSERT INTO promo_codes (code, bonus_percent, min_deposit, max_uses, expires_at, created_by)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {PROMO_COLUMNS}
        "#
    ))
    .bind(&code)
    .bind(promo.bonus_percent)
    .bind(promo.min_deposit)
    .bind(promo.max_uses)
    .bind(promo.expires_at)
    .bind(promo.created_by)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::unique_or(e, "Promo", &code))?;

    Ok(created)
}

/// Look up a promo by code, ignoring case.
pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<PromoCode>> {
    let promo = sqlx::query_as::<_, PromoCode>(&format!(
        "SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = ?"
    ))
    .bind(code.trim())
    .fetch_optional(pool)
    .await?;

    Ok(promo)
}

/// All promos, newest first.
pub async fn list_promos(pool: &SqlitePool) -> Result<Vec<PromoCode>> {
    let rows = sqlx::query_as::<_, PromoCode>(&format!(
        "SELECT {PROMO_COLUMNS} FROM promo_codes ORDER BY id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Promos that are active, unexpired and not used up.
pub async fn list_redeemable(pool: &SqlitePool) -> Result<Vec<PromoCode>> {
    let rows = sqlx::query_as::<_, PromoCode>(&format!(
        r#"
        SELECT {PROMO_COLUMNS}
        FROM promo_codes
        WHERE is_active = 1
          AND (expires_at IS NULL OR expires_at > datetime('now'))
          AND (max_uses = 0 OR current_uses < max_uses)
        ORDER BY bonus_percent DESC, id
        "#
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Whether a promo's expiry has passed.
pub async fn is_expired(pool: &SqlitePool, id: i64) -> Result<bool> {
    let expired = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT expires_at IS NOT NULL AND expires_at <= datetime('now')
        FROM promo_codes WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Promo", id))?;

    Ok(expired)
}

/// Activate or deactivate a promo. Returns whether it exists.
pub async fn set_active(pool: &SqlitePool, code: &str, active: bool) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE promo_codes SET is_active = ? WHERE code = ?
        "#,
    )
    .bind(active)
    .bind(code.trim())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a promo and its usage records. Returns whether it existed.
pub async fn delete_promo(pool: &SqlitePool, code: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM promo_codes WHERE code = ?
        "#,
    )
    .bind(code.trim())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Take one use of a promo.
///
/// Guarded on the cap, the active flag and expiry; `false` means the promo
/// can no longer be redeemed.
pub async fn claim_use<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE promo_codes
        SET current_uses = current_uses + 1
        WHERE id = ?
          AND is_active = 1
          AND (expires_at IS NULL OR expires_at > datetime('now'))
          AND (max_uses = 0 OR current_uses < max_uses)
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a redemption.
pub async fn insert_usage<'e, E>(
    executor: E,
    promo_id: i64,
    user_id: &str,
    order_id: &str,
    deposit_tokens: i64,
    bonus_tokens: i64,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO promo_usages (promo_id, user_id, order_id, deposit_tokens, bonus_tokens)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(promo_id)
    .bind(user_id)
    .bind(order_id)
    .bind(deposit_tokens)
    .bind(bonus_tokens)
    .execute(executor)
    .await?;

    Ok(())
}

/// Redemptions of a promo, newest first.
pub async fn list_usages(pool: &SqlitePool, promo_id: i64) -> Result<Vec<PromoUsage>> {
    let rows = sqlx::query_as::<_, PromoUsage>(
        r#"
        SELECT id, promo_id, user_id, order_id, deposit_tokens, bonus_tokens, created_at
        FROM promo_usages
        WHERE promo_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(promo_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
