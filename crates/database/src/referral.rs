//! Referral codes and referrer/referred links.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{ReferralCode, Referral, ReferredUser};

const CODE_COLUMNS: &str = "user_id, code, total_referrals, total_bonus_earned, created_at";
const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referred_id, bonus_claimed, bonus_amount, created_at, bonus_claimed_at";

/// Store a user's referral code.
pub async fn insert_code(pool: &SqlitePool, user_id: &str, code: &str) -> Result<ReferralCode> {
    let row = sqlx::query_as::<_, ReferralCode>(&format!(
        r#"
        INSERT INTO referral_codes (user_id, code)
        VALUES (?, ?)
        RETURNING {CODE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(code)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::unique_or(e, "ReferralCode", code))?;

    Ok(row)
}

/// The code owned by a user, if one was generated.
pub async fn code_for_user(pool: &SqlitePool, user_id: &str) -> Result<Option<ReferralCode>> {
    let row = sqlx::query_as::<_, ReferralCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM referral_codes WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Resolve a code to its owner, ignoring case.
pub async fn find_by_code(pool: &SqlitePool, code: &str) -> Result<Option<ReferralCode>> {
    let row = sqlx::query_as::<_, ReferralCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM referral_codes WHERE code = ?"
    ))
    .bind(code.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Link a referred user to a referrer.
///
/// A user can be referred once; a second link fails with `AlreadyExists`.
pub async fn create_referral(
    pool: &SqlitePool,
    referrer_id: &str,
    referred_id: &str,
) -> Result<Referral> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, Referral>(&format!(
        r#"
        INSERT INTO referrals (referrer_id, referred_id)
        VALUES (?, ?)
        RETURNING {REFERRAL_COLUMNS}
        "#
    ))
    .bind(referrer_id)
    .bind(referred_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| DatabaseError::unique_or(e, "Referral", referred_id))?;

    sqlx::query(
        r#"
        UPDATE referral_codes SET total_referrals = total_referrals + 1
        WHERE user_id = ?
        "#,
    )
    .bind(referrer_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// The referral link for a referred user, if any.
pub async fn referral_for<'e, E>(executor: E, referred_id: &str) -> Result<Option<Referral>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Referral>(&format!(
        "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referred_id = ?"
    ))
    .bind(referred_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Mark a referral bonus as paid.
///
/// One-way compare-and-swap: returns `false` if it was already claimed.
pub async fn claim_bonus<'e, E>(executor: E, referred_id: &str, amount: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE referrals
        SET bonus_claimed = 1,
            bonus_amount = ?,
            bonus_claimed_at = datetime('now')
        WHERE referred_id = ? AND bonus_claimed = 0
        "#,
    )
    .bind(amount)
    .bind(referred_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Add to a referrer's lifetime earnings.
pub async fn add_bonus_earned<'e, E>(executor: E, referrer_id: &str, amount: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE referral_codes SET total_bonus_earned = total_bonus_earned + ?
        WHERE user_id = ?
        "#,
    )
    .bind(amount)
    .bind(referrer_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Users referred by `referrer_id`, newest first.
pub async fn list_referred_users(
    pool: &SqlitePool,
    referrer_id: &str,
    limit: i64,
) -> Result<Vec<ReferredUser>> {
    let rows = sqlx::query_as::<_, ReferredUser>(
        r#"
        SELECT r.referred_id, u.username, u.display_name, r.bonus_claimed, r.created_at
        FROM referrals r
        JOIN users u ON u.user_id = r.referred_id
        WHERE r.referrer_id = ?
        ORDER BY r.id DESC
        LIMIT ?
        "#,
    )
    .bind(referrer_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Referred users whose bonus has not been paid yet.
pub async fn count_pending_bonuses(pool: &SqlitePool, referrer_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM referrals
        WHERE referrer_id = ? AND bonus_claimed = 0
        "#,
    )
    .bind(referrer_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
