//! Lookup request records and the cache read path.

use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::{DatabaseError, Result};
use crate::models::{LookupRequest, RequestCompletion};
use crate::tokens::Tokens;

const REQUEST_COLUMNS: &str = "id, request_id, user_id, command, query, api_type, token_cost, \
    status, response_summary, response_data, api_remaining, error_message, from_cache, \
    source_request_id, created_at";

/// Insert a pending request under a caller-generated public id.
pub async fn insert_request<'e, E>(
    executor: E,
    request_id: &str,
    user_id: &str,
    command: &str,
    query: &str,
    api_type: &str,
    token_cost: Tokens,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO requests (request_id, user_id, command, query, api_type, token_cost)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request_id)
    .bind(user_id)
    .bind(command)
    .bind(query)
    .bind(api_type)
    .bind(token_cost)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::unique_or(e, "Request", request_id))?;

    Ok(())
}

/// Write the terminal state of a pending request.
///
/// Only a `pending` row is updated; returns `false` if the request had
/// already finished.
pub async fn complete_request<'e, E>(
    executor: E,
    request_id: &str,
    completion: &RequestCompletion<'_>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE requests
        SET status = ?,
            response_summary = ?,
            response_data = ?,
            api_remaining = ?,
            error_message = ?,
            from_cache = ?,
            source_request_id = ?
        WHERE request_id = ? AND status = 'pending'
        "#,
    )
    .bind(completion.status)
    .bind(completion.response_summary)
    .bind(completion.response_data)
    .bind(completion.api_remaining)
    .bind(completion.error_message)
    .bind(completion.source_request_id.is_some())
    .bind(completion.source_request_id)
    .bind(request_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get a request by public id.
pub async fn get_request(pool: &SqlitePool, request_id: &str) -> Result<LookupRequest> {
    sqlx::query_as::<_, LookupRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE request_id = ?"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Request", request_id))
}

/// Most recent successful request with a stored payload for the same
/// feature and query, no older than `max_age_days`.
pub async fn find_cached(
    pool: &SqlitePool,
    command: &str,
    query: &str,
    max_age_days: i64,
) -> Result<Option<LookupRequest>> {
    let modifier = format!("-{} days", max_age_days);
    let row = sqlx::query_as::<_, LookupRequest>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM requests
        WHERE command = ? AND query = ? AND status = 'success'
          AND response_data IS NOT NULL AND response_data <> ''
          AND created_at >= datetime('now', ?)
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(command)
    .bind(query)
    .bind(modifier)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// A user's requests from the last `days` days, newest first.
pub async fn list_user_requests_within_days(
    pool: &SqlitePool,
    user_id: &str,
    days: i64,
    limit: i64,
) -> Result<Vec<LookupRequest>> {
    let modifier = format!("-{} days", days);
    let rows = sqlx::query_as::<_, LookupRequest>(&format!(
        r#"
        SELECT {REQUEST_COLUMNS}
        FROM requests
        WHERE user_id = ? AND created_at >= datetime('now', ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#
    ))
    .bind(user_id)
    .bind(modifier)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of requests a user made today (UTC).
pub async fn count_user_requests_today(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM requests
        WHERE user_id = ? AND date(created_at) = date('now')
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Age of a request in whole days.
pub async fn age_in_days(pool: &SqlitePool, request_id: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT CAST(julianday('now') - julianday(created_at) AS INTEGER)
        FROM requests WHERE request_id = ?
        "#,
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Request", request_id))
}
