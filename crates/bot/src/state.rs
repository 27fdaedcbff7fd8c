//! Application state shared across routes.

use std::sync::Arc;

use crate::handler::CommandHandler;
use crate::sender::MessageSender;

/// Shared application state.
pub struct AppState<S: MessageSender> {
    /// Command handler, also the way to the deposit engine.
    pub handler: Arc<CommandHandler<S>>,
    /// HMAC secret for payment webhooks. Webhooks are refused without one.
    pub webhook_secret: Option<String>,
}

impl<S: MessageSender> AppState<S> {
    pub fn new(handler: Arc<CommandHandler<S>>, webhook_secret: Option<String>) -> Self {
        Self {
            handler,
            webhook_secret,
        }
    }
}

impl<S: MessageSender> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            webhook_secret: self.webhook_secret.clone(),
        }
    }
}
