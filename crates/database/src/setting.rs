//! Runtime settings stored as key/value text.

use sqlx::SqlitePool;

use crate::models::Setting;
use crate::Result;

/// Create or update a setting.
pub async fn upsert_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a setting value by key.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>(
        r#"
        SELECT value FROM settings
        WHERE key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

/// All settings, ordered by key.
pub async fn list_settings(pool: &SqlitePool) -> Result<Vec<Setting>> {
    let rows = sqlx::query_as::<_, Setting>(
        r#"
        SELECT key, value, updated_at
        FROM settings
        ORDER BY key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Remove a setting. Returns whether it existed.
pub async fn delete_setting(pool: &SqlitePool, key: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM settings
        WHERE key = ?
        "#,
    )
    .bind(key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
