//! Delayed provider - wraps another provider with artificial latency.

use std::time::Duration;

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use tokio::time::sleep;

/// Sleeps before delegating. Useful for exercising timeouts.
pub struct DelayedProvider<P: LookupProvider> {
    inner: P,
    delay: Duration,
}

impl<P: LookupProvider> DelayedProvider<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn with_millis(inner: P, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<P: LookupProvider> LookupProvider for DelayedProvider<P> {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        sleep(self.delay).await;
        self.inner.lookup(query).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}
