//! Chat front end for the token ledger.
//!
//! Turns chat updates into ledger operations and renders the results:
//!
//! - [`handler::CommandHandler`] parses commands, applies cooldowns and
//!   rate limits and calls into [`ledger`].
//! - [`sender::MessageSender`] is the outbound seam. Anything that can
//!   deliver text (a chat API client, a log, a test recorder) plugs in
//!   there.
//! - [`routes`] exposes the handler over HTTP together with the payment
//!   gateway webhook.

pub mod config;
pub mod error;
pub mod handler;
pub mod limits;
pub mod notify;
pub mod render;
pub mod routes;
pub mod sender;
pub mod state;
pub mod update;

pub use config::{BotConfig, ConfigError, FeatureSource};
pub use error::{BotError, Result};
pub use handler::{CommandHandler, OWNER_COMMANDS};
pub use limits::{Cooldowns, RateLimiter};
pub use sender::{Button, LoggingSender, MessageSender, NoOpSender, RecordingSender, Sent};
pub use state::AppState;
pub use update::{Author, CallbackQuery, Chat, Command, IncomingMessage, Update};
