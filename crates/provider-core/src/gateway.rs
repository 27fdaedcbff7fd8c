//! The payment gateway trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A payable order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Payable reference, e.g. a QRIS string to render as a QR code.
    pub pay_ref: String,
    /// Hosted checkout page, if the gateway offers one.
    pub checkout_url: Option<String>,
    /// When the gateway stops accepting payment.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Gateway-side state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
}

/// A payment gateway that issues payable orders and reports their status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order for `amount` (fiat) under our `order_id`.
    async fn create_order(&self, order_id: &str, amount: i64) -> Result<GatewayOrder, GatewayError>;

    /// Query an order's status.
    async fn check_status(&self, order_id: &str) -> Result<PaymentStatus, GatewayError>;

    /// Gateway name for logs.
    fn name(&self) -> &str;
}
