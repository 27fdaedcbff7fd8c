//! Payment gateway adapters.
//!
//! [`CashiGateway`] talks to the Cashi QRIS API; [`webhook`] verifies and
//! parses its settlement notifications; [`ScriptedGateway`] stands in for
//! it in tests.

mod cashi;
mod config;
mod error;
mod scripted;
pub mod webhook;

pub use cashi::{map_status, CashiGateway};
pub use config::{CashiConfig, DEFAULT_BASE_URL};
pub use error::PaymentGatewayError;
pub use scripted::ScriptedGateway;
pub use webhook::{verify_signature, WebhookEvent, PAYMENT_SETTLED};

pub use provider_core::{GatewayError, GatewayOrder, PaymentGateway, PaymentStatus};
