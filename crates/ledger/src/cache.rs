//! Fallback reads of earlier successful lookups.

use database::{request, Database};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// A stored provider response that can stand in for a failed live call.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// The request that fetched the data live.
    pub request_id: String,
    pub payload: Value,
    pub summary: Option<String>,
    pub created_at: String,
}

/// Read-only view of past successful requests.
///
/// Never consulted before the live provider; stale rows simply stop
/// matching the age filter.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    database: Database,
}

impl ResponseCache {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Most recent successful response for `feature` and `query` no older
    /// than `max_age_days`.
    pub async fn lookup(
        &self,
        feature: &str,
        query: &str,
        max_age_days: i64,
    ) -> Result<Option<CachedResponse>> {
        let Some(row) =
            request::find_cached(self.database.pool(), feature, query, max_age_days).await?
        else {
            return Ok(None);
        };

        let Some(data) = row.response_data.as_deref() else {
            return Ok(None);
        };

        match serde_json::from_str::<Value>(data) {
            Ok(payload) => Ok(Some(CachedResponse {
                request_id: row.request_id,
                payload,
                summary: row.response_summary,
                created_at: row.created_at,
            })),
            Err(e) => {
                warn!(request_id = %row.request_id, "Cached payload is not valid JSON: {}", e);
                Ok(None)
            }
        }
    }
}
