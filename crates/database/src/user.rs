//! User records.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::User;

const USER_COLUMNS: &str =
    "user_id, username, display_name, token_balance, total_checks, created_at, updated_at";

/// Get a user by id.
pub async fn get_user<'e, E>(executor: E, user_id: &str) -> Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    find_user(executor, user_id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", user_id))
}

/// Get a user by id, or `None`.
pub async fn find_user<'e, E>(executor: E, user_id: &str) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(user)
}

/// Get a user, creating it on first interaction.
///
/// Name fields are refreshed when the caller supplies different values.
pub async fn get_or_create_user(
    pool: &SqlitePool,
    user_id: &str,
    username: Option<&str>,
    display_name: Option<&str>,
) -> Result<User> {
    let upserted = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (user_id, username, display_name)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            username = COALESCE(excluded.username, users.username),
            display_name = COALESCE(excluded.display_name, users.display_name),
            updated_at = datetime('now')
        WHERE (excluded.username IS NOT NULL AND excluded.username IS NOT users.username)
           OR (excluded.display_name IS NOT NULL AND excluded.display_name IS NOT users.display_name)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(username)
    .bind(display_name)
    .fetch_optional(pool)
    .await?;

    match upserted {
        Some(user) => Ok(user),
        None => get_user(pool, user_id).await,
    }
}

/// Count total users.
pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Count users created today (UTC).
pub async fn count_users_created_today(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM users
        WHERE date(created_at) = date('now')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
