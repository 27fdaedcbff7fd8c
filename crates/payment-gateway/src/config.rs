//! Cashi configuration.

use std::env;
use std::time::Duration;

use crate::error::PaymentGatewayError;

pub const DEFAULT_BASE_URL: &str = "https://cashi.id/api";

/// Connection settings for [`CashiGateway`](crate::CashiGateway).
#[derive(Debug, Clone)]
pub struct CashiConfig {
    pub base_url: String,
    pub api_key: String,
    /// Shared secret for webhook signatures. Webhooks are refused without one.
    pub webhook_secret: Option<String>,
    pub create_timeout: Duration,
    pub status_timeout: Duration,
}

impl CashiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            webhook_secret: None,
            create_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CASHI_API_KEY` | API key sent as `x-api-key` | required |
    /// | `CASHI_WEBHOOK_SECRET` | Webhook HMAC secret | unset |
    /// | `CASHI_BASE_URL` | API base URL | `https://cashi.id/api` |
    pub fn from_env() -> Result<Self, PaymentGatewayError> {
        let api_key = env::var("CASHI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaymentGatewayError::Config("CASHI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = env::var("CASHI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(secret) = env::var("CASHI_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
        {
            config = config.with_webhook_secret(secret);
        }
        Ok(config)
    }
}
