//! Aggregate counters for the owner dashboard.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::tokens::Tokens;
use crate::Result;

/// Bot-wide totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_users: i64,
    pub new_users_today: i64,
    /// Fiat received through approved deposits.
    pub total_deposit_amount: i64,
    /// Whole tokens sold through approved deposits.
    pub total_tokens_sold: i64,
    pub approved_deposits: i64,
    pub rejected_deposits: i64,
    pub pending_deposits: i64,
    pub total_checks: i64,
}

#[derive(Debug, FromRow)]
struct DepositTotals {
    approved_count: i64,
    total_amount: i64,
    total_tokens: i64,
    pending_count: i64,
    rejected_count: i64,
}

/// Request volume for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct FeatureUsage {
    pub command: String,
    pub count: i64,
    pub tokens: Tokens,
}

/// Per-feature request volume, today and all time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiStats {
    pub today: Vec<FeatureUsage>,
    pub total: Vec<FeatureUsage>,
}

/// Compute bot-wide totals.
pub async fn overall(pool: &SqlitePool) -> Result<OverallStats> {
    let total_users = crate::user::count_users(pool).await?;
    let new_users_today = crate::user::count_users_created_today(pool).await?;

    let deposits = sqlx::query_as::<_, DepositTotals>(
        r#"
        SELECT
            COUNT(CASE WHEN status = 'approved' THEN 1 END) AS approved_count,
            COALESCE(SUM(CASE WHEN status = 'approved' THEN amount END), 0) AS total_amount,
            COALESCE(SUM(CASE WHEN status = 'approved' THEN token_amount END), 0) AS total_tokens,
            COUNT(CASE WHEN status = 'pending' THEN 1 END) AS pending_count,
            COUNT(CASE WHEN status = 'rejected' THEN 1 END) AS rejected_count
        FROM deposits
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total_checks = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(total_checks), 0) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(OverallStats {
        total_users,
        new_users_today,
        total_deposit_amount: deposits.total_amount,
        total_tokens_sold: deposits.total_tokens,
        approved_deposits: deposits.approved_count,
        rejected_deposits: deposits.rejected_count,
        pending_deposits: deposits.pending_count,
        total_checks,
    })
}

/// Compute per-feature request volume.
pub async fn api_usage(pool: &SqlitePool) -> Result<ApiStats> {
    let today = sqlx::query_as::<_, FeatureUsage>(
        r#"
        SELECT command, COUNT(*) AS count, COALESCE(SUM(token_cost), 0) AS tokens
        FROM requests
        WHERE date(created_at) = date('now')
        GROUP BY command
        ORDER BY count DESC, command
        "#,
    )
    .fetch_all(pool)
    .await?;

    let total = sqlx::query_as::<_, FeatureUsage>(
        r#"
        SELECT command, COUNT(*) AS count, COALESCE(SUM(token_cost), 0) AS tokens
        FROM requests
        GROUP BY command
        ORDER BY count DESC, command
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ApiStats { today, total })
}
