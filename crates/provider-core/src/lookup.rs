//! The lookup provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LookupError;

/// Data returned by a successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Raw provider data. Persisted as-is and served back from cache.
    pub payload: Value,
    /// Short human-readable summary, if the provider gives one.
    pub summary: Option<String>,
    /// Remaining quota as reported by the provider.
    pub api_remaining: Option<String>,
    /// Set when data was found but part of it is missing (e.g. no photo).
    pub partial: Option<String>,
}

impl LookupResponse {
    /// A complete response.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            summary: None,
            api_remaining: None,
            partial: None,
        }
    }

    /// Attach a summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Attach the provider's remaining-quota string.
    pub fn with_remaining(mut self, remaining: impl Into<String>) -> Self {
        self.api_remaining = Some(remaining.into());
        self
    }

    /// Mark the response partial with a reason.
    pub fn partial(mut self, reason: impl Into<String>) -> Self {
        self.partial = Some(reason.into());
        self
    }

    /// Whether the payload carries no data.
    pub fn is_empty(&self) -> bool {
        match &self.payload {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// A source of identity data, called once per priced lookup.
///
/// Adapters that submit a job and poll for its result present the whole
/// flow as one call and must bound its total duration themselves.
/// This trait is object-safe and can be used with `Arc<dyn LookupProvider>`.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Look up `query`.
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError>;

    /// Provider tag recorded on each request.
    fn name(&self) -> &str;

    /// Check if the provider is configured and usable.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
