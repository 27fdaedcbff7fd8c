//! HTTP routes.

pub mod health;
pub mod updates;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;

use crate::sender::MessageSender;
use crate::state::AppState;

/// Build the router with all routes.
pub fn router<S: MessageSender + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        // Chat platform updates
        .route("/updates", post(updates::receive::<S>))
        // Payment gateway notifications
        .route("/webhook/cashi", post(webhook::cashi::<S>))
}
