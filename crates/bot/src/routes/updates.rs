//! Inbound chat updates.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use crate::sender::MessageSender;
use crate::state::AppState;
use crate::update::Update;

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub ok: bool,
    pub update_id: i64,
}

/// Accept an update and handle it in the background.
///
/// Lookups can run for minutes, longer than platforms wait for a webhook
/// reply, so the update is acknowledged straight away.
pub async fn receive<S: MessageSender + 'static>(
    State(state): State<AppState<S>>,
    Json(update): Json<Update>,
) -> Json<Accepted> {
    let update_id = update.update_id;
    debug!(update_id, "Update received");

    let handler = state.handler.clone();
    tokio::spawn(async move {
        if let Err(e) = handler.handle(update).await {
            error!(update_id, error = %e, "Update handling failed");
        }
    });

    Json(Accepted { ok: true, update_id })
}
