//! Providers with a fixed answer.

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use serde_json::Value;

/// Answers every query with the same payload.
pub struct StaticProvider {
    name: String,
    payload: Value,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[async_trait]
impl LookupProvider for StaticProvider {
    async fn lookup(&self, _query: &str) -> Result<LookupResponse, LookupError> {
        Ok(LookupResponse::new(self.payload.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fails every query with the same error.
pub struct FailingProvider {
    name: String,
    error: LookupError,
}

impl FailingProvider {
    pub fn new(name: impl Into<String>, error: LookupError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    /// Fails with a permanent provider error.
    pub fn down(name: impl Into<String>) -> Self {
        Self::new(name, LookupError::permanent("provider down"))
    }
}

#[async_trait]
impl LookupProvider for FailingProvider {
    async fn lookup(&self, _query: &str) -> Result<LookupResponse, LookupError> {
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_ready(&self) -> bool {
        false
    }
}

/// Finds nothing for any query.
pub struct EmptyProvider {
    name: String,
}

impl EmptyProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl LookupProvider for EmptyProvider {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        Err(LookupError::Empty(format!("nothing for {}", query)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Answers with data that is missing a part.
pub struct PartialProvider {
    name: String,
    payload: Value,
    reason: String,
}

impl PartialProvider {
    pub fn new(name: impl Into<String>, payload: Value, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LookupProvider for PartialProvider {
    async fn lookup(&self, _query: &str) -> Result<LookupResponse, LookupError> {
        Ok(LookupResponse::new(self.payload.clone()).partial(self.reason.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
