//! Payment gateway webhooks.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use ledger::{LedgerError, SettleOutcome, WEBHOOK};
use payment_gateway::{verify_signature, WebhookEvent};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::notify;
use crate::sender::MessageSender;
use crate::state::AppState;

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Serialize)]
pub struct WebhookReply {
    /// `settled`, `duplicate` or `ignored`.
    pub status: &'static str,
}

fn reply(status: &'static str) -> Json<WebhookReply> {
    Json(WebhookReply { status })
}

/// Verify and apply a Cashi notification.
///
/// Unknown orders and non-settlement events are acknowledged so the
/// gateway stops retrying them.
pub async fn cashi<S: MessageSender + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReply>> {
    let Some(secret) = state.webhook_secret.as_deref() else {
        warn!("Webhook received but no webhook secret is configured");
        return Err(BotError::Unauthorized("webhooks are not configured".to_string()));
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BotError::Unauthorized("missing signature".to_string()))?;
    verify_signature(secret, &body, signature).map_err(|e| {
        warn!(error = %e, "Webhook signature rejected");
        BotError::Unauthorized("invalid signature".to_string())
    })?;

    let event = WebhookEvent::parse(&body).map_err(|e| BotError::BadRequest(e.to_string()))?;
    let Some(order_id) = event.settled_order_id() else {
        info!(event = %event.event, order_id = %event.data.order_id, "Ignoring webhook event");
        return Ok(reply("ignored"));
    };

    let deposits = state.handler.deposits();
    match deposits.settle_by_order_id(order_id, WEBHOOK).await {
        Ok(SettleOutcome::Settled(done)) => {
            info!(order_id, deposit_id = done.deposit_id, "Deposit settled by webhook");
            notify::settled(state.handler.sender().as_ref(), &done).await;
            Ok(reply("settled"))
        }
        Ok(SettleOutcome::AlreadySettled(status)) => {
            info!(order_id, status = status.as_str(), "Webhook for a concluded deposit");
            Ok(reply("duplicate"))
        }
        Err(LedgerError::NotFound { .. }) => {
            warn!(order_id, "Webhook for an unknown order");
            Ok(reply("ignored"))
        }
        Err(e) => Err(e.into()),
    }
}
