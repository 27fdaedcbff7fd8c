//! Inbound chat updates and command parsing.

use serde::{Deserialize, Serialize};

/// The account a message or button press came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Author {
    pub fn user_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Author>,
    #[serde(default)]
    pub text: Option<String>,
}

/// An inline button press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Author,
    #[serde(default)]
    pub data: Option<String>,
}

/// One update pushed by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// A text message update, for tests and local tooling.
    pub fn text(update_id: i64, user_id: i64, text: &str) -> Self {
        Self {
            update_id,
            message: Some(IncomingMessage {
                message_id: update_id,
                chat: Chat { id: user_id },
                from: Some(Author {
                    id: user_id,
                    username: None,
                    first_name: None,
                }),
                text: Some(text.to_string()),
            }),
            callback_query: None,
        }
    }

    /// A button press update.
    pub fn button(update_id: i64, user_id: i64, data: &str) -> Self {
        Self {
            update_id,
            message: None,
            callback_query: Some(CallbackQuery {
                id: format!("cb{}", update_id),
                from: Author {
                    id: user_id,
                    username: None,
                    first_name: None,
                },
                data: Some(data.to_string()),
            }),
        }
    }
}

/// A slash command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lower-cased, without the slash or `@botname`.
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse `/name@bot arg1 arg2`. Returns `None` for plain text.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or_default().to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, joined by spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|a| a.join(" ")).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        let cmd = Command::parse("/Deposit@LedgerBot 25  PROMO10").unwrap();
        assert_eq!(cmd.name, "deposit");
        assert_eq!(cmd.args, vec!["25", "PROMO10"]);
        assert_eq!(cmd.arg(1), Some("PROMO10"));
        assert_eq!(cmd.arg(2), None);

        let cmd = Command::parse("/nama BUDI SANTOSO").unwrap();
        assert_eq!(cmd.rest(0), "BUDI SANTOSO");
        assert_eq!(cmd.rest(5), "");

        assert!(Command::parse("hello").is_none());
        assert!(Command::parse("/").is_none());
        assert!(Command::parse("").is_none());
    }

    #[test]
    fn test_update_json() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":9,"message":{"message_id":4,"chat":{"id":7012345678},
                "from":{"id":7012345678,"username":"budi"},"text":"/saldo"}}"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.from.unwrap().user_id(), "7012345678");
        assert_eq!(message.text.as_deref(), Some("/saldo"));
        assert!(update.callback_query.is_none());
    }
}
