//! Fixed-backoff retries for transient provider failures.

use std::time::Duration;

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use tokio::time::sleep;
use tracing::warn;

/// Wraps a provider and retries transient failures and timeouts.
///
/// Empty results and permanent failures are returned immediately.
pub struct Retrying<P: LookupProvider> {
    inner: P,
    attempts: u32,
    backoff: Duration,
}

impl<P: LookupProvider> Retrying<P> {
    /// Two attempts, two seconds apart.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            attempts: 2,
            backoff: Duration::from_secs(2),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: LookupProvider> LookupProvider for Retrying<P> {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        let mut attempt = 1;
        loop {
            match self.inner.lookup(query).await {
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "Provider attempt failed, retrying"
                    );
                    attempt += 1;
                    sleep(self.backoff).await;
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}
