//! Cashi QRIS gateway client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use provider_core::{GatewayError, GatewayOrder, PaymentGateway, PaymentStatus};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CashiConfig;
use crate::error::PaymentGatewayError;

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(alias = "checkoutUrl")]
    checkout_url: Option<String>,
    #[serde(alias = "qrUrl", alias = "qr")]
    qr_url: Option<String>,
    #[serde(alias = "expiresAt")]
    expires_at: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Map a Cashi order status to a [`PaymentStatus`].
///
/// `SETTLED` and `PAID` are paid, `EXPIRED` is expired, anything else is
/// still pending.
pub fn map_status(status: &str) -> PaymentStatus {
    match status.trim().to_ascii_uppercase().as_str() {
        "SETTLED" | "PAID" => PaymentStatus::Paid,
        "EXPIRED" => PaymentStatus::Expired,
        _ => PaymentStatus::Pending,
    }
}

fn transport(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::InvalidResponse(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

/// Turn a non-2xx response into an error, keeping Cashi's message if any.
async fn status_error(response: Response) -> GatewayError {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::Unavailable(message)
    } else {
        GatewayError::Rejected(message)
    }
}

/// [`PaymentGateway`] backed by the Cashi API.
pub struct CashiGateway {
    config: CashiConfig,
    client: reqwest::Client,
}

impl CashiGateway {
    pub fn new(config: CashiConfig) -> Result<Self, PaymentGatewayError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CashiConfig {
        &self.config
    }
}

#[async_trait]
impl PaymentGateway for CashiGateway {
    async fn create_order(&self, order_id: &str, amount: i64) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/create-order", self.config.base_url);
        debug!(order_id, amount, "Creating Cashi order");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .timeout(self.config.create_timeout)
            .json(&CreateOrderRequest { amount, order_id })
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: CreateOrderResponse = response.json().await.map_err(transport)?;
        if !body.success {
            return Err(GatewayError::Rejected(
                body.message
                    .or(body.error)
                    .unwrap_or_else(|| "failed to create order".to_string()),
            ));
        }

        let pay_ref = body
            .qr_url
            .clone()
            .or_else(|| body.checkout_url.clone())
            .ok_or_else(|| GatewayError::InvalidResponse("order has no QR or checkout URL".into()))?;

        let expires_at = body.expires_at.as_deref().and_then(|raw| {
            match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => Some(t.with_timezone(&Utc)),
                Err(e) => {
                    warn!(order_id, expires_at = raw, error = %e, "Ignoring unreadable expiry");
                    None
                }
            }
        });

        Ok(GatewayOrder {
            pay_ref,
            checkout_url: body.checkout_url,
            expires_at,
        })
    }

    async fn check_status(&self, order_id: &str) -> Result<PaymentStatus, GatewayError> {
        let url = format!("{}/check-status/{}", self.config.base_url, order_id);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .timeout(self.config.status_timeout)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: StatusResponse = response.json().await.map_err(transport)?;
        let status = body
            .status
            .ok_or_else(|| GatewayError::InvalidResponse("status missing".to_string()))?;
        Ok(map_status(&status))
    }

    fn name(&self) -> &str {
        "cashi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        assert_eq!(map_status("SETTLED"), PaymentStatus::Paid);
        assert_eq!(map_status("paid"), PaymentStatus::Paid);
        assert_eq!(map_status("EXPIRED"), PaymentStatus::Expired);
        assert_eq!(map_status("PENDING"), PaymentStatus::Pending);
        assert_eq!(map_status("WHATEVER"), PaymentStatus::Pending);
    }

    #[test]
    fn test_create_response_aliases() {
        let body: CreateOrderResponse = serde_json::from_str(
            r#"{"success":true,"checkoutUrl":"https://pay/x","qr":"000201...","expiresAt":"2026-01-01T00:10:00Z"}"#,
        )
        .unwrap();
        assert!(body.success);
        assert_eq!(body.qr_url.as_deref(), Some("000201..."));
        assert_eq!(body.checkout_url.as_deref(), Some("https://pay/x"));
        assert_eq!(body.expires_at.as_deref(), Some("2026-01-01T00:10:00Z"));
    }
}
