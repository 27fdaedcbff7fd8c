//! Message sender trait and implementations.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BotError;

/// Identifier of a sent message, used for later edits.
pub type MessageId = i64;

/// An inline button. Pressing it sends `data` back as a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Trait for talking to the chat platform.
///
/// Abstracted to support different transports (Telegram, tests, etc.)
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a text message and return its id.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId, BotError>;

    /// Replace the text of a message sent earlier.
    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BotError>;

    /// Send a photo (for deposits, the payment QR) with a caption and
    /// inline buttons.
    async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageId, BotError>;

    /// Acknowledge an inline button press.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BotError>;
}

/// A no-op message sender that discards all messages.
#[derive(Debug, Clone, Default)]
pub struct NoOpSender;

#[async_trait]
impl MessageSender for NoOpSender {
    async fn send_message(&self, _chat_id: &str, _text: &str) -> Result<MessageId, BotError> {
        Ok(0)
    }

    async fn edit_message(
        &self,
        _chat_id: &str,
        _message_id: MessageId,
        _text: &str,
    ) -> Result<(), BotError> {
        Ok(())
    }

    async fn send_photo(
        &self,
        _chat_id: &str,
        _photo: &str,
        _caption: &str,
        _buttons: &[Button],
    ) -> Result<MessageId, BotError> {
        Ok(0)
    }

    async fn answer_callback(&self, _callback_id: &str, _text: &str) -> Result<(), BotError> {
        Ok(())
    }
}

/// A sender that logs every operation instead of delivering it.
#[derive(Debug, Default)]
pub struct LoggingSender {
    next_id: AtomicI64,
}

impl LoggingSender {
    fn next(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId, BotError> {
        let id = self.next();
        tracing::info!(chat_id, message_id = id, "Sending message: {}", text);
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BotError> {
        tracing::info!(chat_id, message_id, "Editing message: {}", text);
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageId, BotError> {
        let id = self.next();
        tracing::info!(
            chat_id,
            message_id = id,
            photo,
            buttons = buttons.len(),
            "Sending photo: {}",
            caption
        );
        Ok(id)
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BotError> {
        tracing::info!(callback_id, "Answering callback: {}", text);
        Ok(())
    }
}

/// Something a [`RecordingSender`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        chat_id: String,
        message_id: MessageId,
        text: String,
    },
    Edit {
        chat_id: String,
        message_id: MessageId,
        text: String,
    },
    Photo {
        chat_id: String,
        message_id: MessageId,
        photo: String,
        caption: String,
        buttons: Vec<Button>,
    },
    Callback {
        callback_id: String,
        text: String,
    },
}

impl Sent {
    /// The visible text: message body, edit body, photo caption or
    /// callback answer.
    pub fn text(&self) -> &str {
        match self {
            Sent::Message { text, .. } | Sent::Edit { text, .. } | Sent::Callback { text, .. } => {
                text
            }
            Sent::Photo { caption, .. } => caption,
        }
    }

    fn chat_id(&self) -> Option<&str> {
        match self {
            Sent::Message { chat_id, .. } | Sent::Edit { chat_id, .. } | Sent::Photo { chat_id, .. } => {
                Some(chat_id)
            }
            Sent::Callback { .. } => None,
        }
    }
}

/// Records everything for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Visible texts delivered to `chat_id`, in order.
    pub fn texts_to(&self, chat_id: &str) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|s| s.chat_id() == Some(chat_id))
            .map(|s| s.text().to_string())
            .collect()
    }

    /// The most recent visible text delivered to `chat_id`.
    pub fn last_text(&self, chat_id: &str) -> Option<String> {
        self.texts_to(chat_id).pop()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn record(&self, entry: Sent) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(entry);
        }
    }

    fn next(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId, BotError> {
        let message_id = self.next();
        self.record(Sent::Message {
            chat_id: chat_id.to_string(),
            message_id,
            text: text.to_string(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), BotError> {
        self.record(Sent::Edit {
            chat_id: chat_id.to_string(),
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: &str,
        buttons: &[Button],
    ) -> Result<MessageId, BotError> {
        let message_id = self.next();
        self.record(Sent::Photo {
            chat_id: chat_id.to_string(),
            message_id,
            photo: photo.to_string(),
            caption: caption.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(message_id)
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), BotError> {
        self.record(Sent::Callback {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_and_logging_senders() {
        NoOpSender.send_message("7012345678", "test").await.unwrap();

        let sender = LoggingSender::default();
        let first = sender.send_message("7012345678", "test").await.unwrap();
        let second = sender
            .send_photo("7012345678", "QR", "pay", &[Button::new("Check", "check_deposit_1")])
            .await
            .unwrap();
        assert_ne!(first, second);
        sender.edit_message("7012345678", first, "edited").await.unwrap();
        sender.answer_callback("cb1", "ok").await.unwrap();
    }

    #[tokio::test]
    async fn test_recording_sender() {
        let sender = RecordingSender::new();
        let id = sender.send_message("111", "Searching...").await.unwrap();
        sender.edit_message("111", id, "Found").await.unwrap();
        sender.send_message("222", "other chat").await.unwrap();
        sender.answer_callback("cb", "Status: pending").await.unwrap();

        assert_eq!(sender.texts_to("111"), vec!["Searching...", "Found"]);
        assert_eq!(sender.last_text("222").as_deref(), Some("other chat"));
        assert_eq!(sender.sent().len(), 4);

        sender.clear();
        assert!(sender.sent().is_empty());
    }
}
