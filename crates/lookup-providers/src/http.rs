//! Single-request JSON providers.

use std::time::Duration;

use async_trait::async_trait;
use provider_core::{LookupError, LookupProvider, LookupResponse};
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

use crate::error::{from_status, from_transport, ProviderError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fill `{query}` and `{key}` in a URL template. Both are URL-encoded.
pub(crate) fn expand(template: &str, query: &str, key: &str) -> String {
    let query: String = byte_serialize(query.as_bytes()).collect();
    let key: String = byte_serialize(key.as_bytes()).collect();
    template.replace("{query}", &query).replace("{key}", &key)
}

/// Check that a template has a `{query}` slot and expands to a valid URL.
pub(crate) fn check_template(template: &str) -> Result<(), ProviderError> {
    let invalid = |reason: &str| ProviderError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };
    if !template.contains("{query}") {
        return Err(invalid("missing {query}"));
    }
    url::Url::parse(&expand(template, "q", "k")).map_err(|e| invalid(&e.to_string()))?;
    Ok(())
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// `true`, `"true"` or `1`.
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Whether a JSON value carries no data.
pub(crate) fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Configuration for [`HttpJsonProvider`].
#[derive(Debug, Clone)]
pub struct HttpJsonConfig {
    /// Provider tag recorded on requests.
    pub name: String,
    /// GET URL with `{query}` and optional `{key}` slots.
    pub url_template: String,
    pub api_key: String,
    /// Field holding the data.
    pub data_field: String,
    /// Field that, when true, means "nothing found".
    pub error_field: String,
    /// Field with a human-readable message.
    pub message_field: String,
    /// Field with a remaining-quota value.
    pub remaining_field: Option<String>,
    /// Fields of the data object that must be present for a full result.
    /// A missing one makes the response partial.
    pub required_fields: Vec<String>,
    pub timeout: Duration,
}

impl HttpJsonConfig {
    /// Defaults: `data` / `error` / `message` fields, 60 second timeout.
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            api_key: String::new(),
            data_field: "data".to_string(),
            error_field: "error".to_string(),
            message_field: "message".to_string(),
            remaining_field: None,
            required_fields: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_remaining_field(mut self, field: impl Into<String>) -> Self {
        self.remaining_field = Some(field.into());
        self
    }

    pub fn with_required_field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A provider answering one GET with a JSON envelope such as
/// `{"error": false, "message": "...", "data": {...}}`.
///
/// An error flag or a missing or empty data field is reported as
/// [`LookupError::Empty`]; transport failures are transient.
pub struct HttpJsonProvider {
    config: HttpJsonConfig,
    client: reqwest::Client,
}

impl HttpJsonProvider {
    pub fn new(config: HttpJsonConfig) -> Result<Self, ProviderError> {
        check_template(&config.url_template)?;
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    /// Interpret a decoded response body.
    fn interpret(&self, body: Value) -> Result<LookupResponse, LookupError> {
        let message = text_of(body.get(&self.config.message_field));

        if truthy(body.get(&self.config.error_field)) {
            return Err(LookupError::Empty(
                message.unwrap_or_else(|| "provider reported no data".to_string()),
            ));
        }

        let data = body.get(&self.config.data_field);
        if is_blank(data) {
            return Err(LookupError::Empty(
                message.unwrap_or_else(|| "empty data".to_string()),
            ));
        }
        let data = data.cloned().unwrap_or(Value::Null);

        let missing: Vec<&str> = self
            .config
            .required_fields
            .iter()
            .filter(|field| is_blank(data.get(field.as_str())))
            .map(String::as_str)
            .collect();

        let mut response = LookupResponse::new(data);
        if let Some(message) = message {
            response = response.with_summary(message);
        }
        if let Some(remaining) = self
            .config
            .remaining_field
            .as_deref()
            .and_then(|field| text_of(body.get(field)))
        {
            response = response.with_remaining(remaining);
        }
        if !missing.is_empty() {
            response = response.partial(format!("missing {}", missing.join(", ")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LookupProvider for HttpJsonProvider {
    async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
        let url = expand(&self.config.url_template, query, &self.config.api_key);
        debug!(provider = %self.config.name, "Calling provider");

        let response = self.client.get(&url).send().await.map_err(from_transport)?;
        if !response.status().is_success() {
            warn!(provider = %self.config.name, status = %response.status(), "Provider returned error status");
            return Err(from_status(response.status()));
        }

        let body: Value = response.json().await.map_err(from_transport)?;
        self.interpret(body)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_ready(&self) -> bool {
        !self.config.url_template.contains("{key}") || !self.config.api_key.is_empty()
    }
}
