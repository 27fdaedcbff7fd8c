//! Submit-then-poll providers.
//!
//! The submit call returns a callback URL; the result appears there once
//! the provider's queue gets to it. The whole flow is one
//! [`LookupProvider::lookup`] call bounded by `max_attempts × poll_delay`;
//! running out of polls is reported as [`LookupError::Timeout`].

use std::time::Duration;

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{from_status, from_transport, ProviderError};
use crate::http::{build_client, check_template, expand, is_blank, truthy};

/// Configuration for [`CallbackProvider`].
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    pub name: String,
    /// GET URL that queues a job, with `{query}` and `{key}` slots.
    pub submit_template: String,
    pub api_key: String,
    /// Field of the submit response holding the callback URL.
    pub callback_field: String,
    /// Messages meaning "still queued".
    pub pending_markers: Vec<String>,
    pub max_attempts: u32,
    pub poll_delay: Duration,
    /// Per-HTTP-call timeout.
    pub request_timeout: Duration,
}

impl CallbackConfig {
    /// Defaults: 20 polls, 10 seconds apart.
    pub fn new(name: impl Into<String>, submit_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submit_template: submit_template.into(),
            api_key: String::new(),
            callback_field: "callback".to_string(),
            pending_markers: vec!["antrian".to_string(), "belum ada hasil".to_string()],
            max_attempts: 20,
            poll_delay: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_polling(mut self, max_attempts: u32, poll_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.poll_delay = poll_delay;
        self
    }

    /// Longest time a lookup can take, excluding the submit call.
    pub fn max_duration(&self) -> Duration {
        self.poll_delay * self.max_attempts
    }
}

/// What one poll of the callback URL said.
#[derive(Debug)]
enum Poll {
    Ready(LookupResponse),
    Waiting,
}

pub struct CallbackProvider {
    config: CallbackConfig,
    client: reqwest::Client,
}

impl CallbackProvider {
    pub fn new(config: CallbackConfig) -> Result<Self, ProviderError> {
        check_template(&config.submit_template)?;
        let client = build_client(config.request_timeout)?;
        Ok(Self { config, client })
    }

    async fn get_json(&self, url: &str) -> Result<Value, LookupError> {
        let response = self.client.get(url).send().await.map_err(from_transport)?;
        if !response.status().is_success() {
            return Err(from_status(response.status()));
        }
        response.json().await.map_err(from_transport)
    }

    /// Queue the job and return the callback URL.
    async fn submit(&self, query: &str) -> Result<String, LookupError> {
        let url = expand(&self.config.submit_template, query, &self.config.api_key);
        let body = self.get_json(&url).await?;

        if !truthy(body.get("success")) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("submit rejected");
            return Err(LookupError::permanent(message));
        }

        body.get(&self.config.callback_field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LookupError::permanent("submit response has no callback URL"))
    }

    fn interpret(&self, body: &Value) -> Result<Poll, LookupError> {
        let data = body.get("data");
        if truthy(body.get("success")) && !is_blank(data) {
            // `[{"data": []}]` is the provider's way of saying "no match"
            let first = data.and_then(|d| d.get(0));
            if first.is_some_and(|f| f.get("data").is_some_and(|inner| is_blank(Some(inner)))) {
                return Err(LookupError::Empty("no record for query".to_string()));
            }

            let mut response = LookupResponse::new(data.cloned().unwrap_or(Value::Null));
            if let Some(message) = body.get("message").and_then(Value::as_str) {
                response = response.with_summary(message);
            }
            return Ok(Poll::Ready(response));
        }

        let message = body.get("message").and_then(Value::as_str).unwrap_or("");
        if !self
            .config
            .pending_markers
            .iter()
            .any(|marker| message.contains(marker.as_str()))
        {
            debug!(provider = %self.config.name, message, "Unrecognised callback reply, still waiting");
        }
        Ok(Poll::Waiting)
    }
}

#[async_trait]
impl LookupProvider for CallbackProvider {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        let callback = self.submit(query).await?;
        info!(provider = %self.config.name, "Lookup queued, polling callback");

        for attempt in 1..=self.config.max_attempts {
            let last = attempt == self.config.max_attempts;

            match self.get_json(&callback).await {
                Ok(body) => match self.interpret(&body)? {
                    Poll::Ready(response) => {
                        debug!(provider = %self.config.name, attempt, "Callback result ready");
                        return Ok(response);
                    }
                    Poll::Waiting => {}
                },
                Err(e) if last => return Err(e),
                Err(e) => {
                    warn!(provider = %self.config.name, attempt, error = %e, "Callback poll failed");
                }
            }

            if !last {
                sleep(self.config.poll_delay).await;
            }
        }

        warn!(
            provider = %self.config.name,
            polls = self.config.max_attempts,
            "No callback result before the poll limit"
        );
        Err(LookupError::Timeout)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_ready(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> CallbackProvider {
        CallbackProvider::new(CallbackConfig::new(
            "foto",
            "https://api.example.com/dukcapil/nik?user_key={key}&nik={query}",
        ))
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = CallbackConfig::new("foto", "https://x/?q={query}");
        assert_eq!(config.max_attempts, 20);
        assert_eq!(config.max_duration(), Duration::from_secs(200));
        assert_eq!(config.with_polling(0, Duration::from_secs(1)).max_attempts, 1);
    }

    #[test]
    fn test_interpret() {
        let p = provider();

        let ready = p
            .interpret(&json!({"success": true, "data": [{"data": [{"nama": "BUDI"}]}]}))
            .unwrap();
        assert!(matches!(ready, Poll::Ready(_)));

        let waiting = p
            .interpret(&json!({"success": false, "message": "masih dalam antrian"}))
            .unwrap();
        assert!(matches!(waiting, Poll::Waiting));

        let empty = p
            .interpret(&json!({"success": true, "data": [{"data": []}]}))
            .unwrap_err();
        assert!(matches!(empty, LookupError::Empty(_)));
    }
}
