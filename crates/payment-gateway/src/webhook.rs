//! Cashi webhook verification and parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::PaymentGatewayError;

/// Event name for a completed payment.
pub const PAYMENT_SETTLED: &str = "PAYMENT_SETTLED";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, PaymentGatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentGatewayError::Signature("unusable secret"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature over the raw body in constant time.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), PaymentGatewayError> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| PaymentGatewayError::Signature("not hex"))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentGatewayError::Signature("unusable secret"))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentGatewayError::Signature("mismatch"))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookData {
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    /// Cashi sends this as a number or a string.
    #[serde(default)]
    pub amount: Value,
}

/// A webhook notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentGatewayError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The order to settle, if this event reports a settled payment.
    pub fn settled_order_id(&self) -> Option<&str> {
        (self.event == PAYMENT_SETTLED && self.data.status.eq_ignore_ascii_case("SETTLED"))
            .then_some(self.data.order_id.as_str())
    }
}
