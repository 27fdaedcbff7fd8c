//! Chat command handling.
//!
//! ```text
//! Update ─┬─ button press ──→ deposit status / cancel ──→ answer_callback
//!         └─ /command ──→ rate limit ──→ ensure user ──→ cooldown
//!                          ├─ user commands (balance, lookups, deposits, ...)
//!                          └─ owner commands (approvals, prices, promos, ...)
//! ```
//!
//! Refusals from the ledger (balance, maintenance, bad promo, ...) become
//! replies. Storage errors are logged, answered with a generic apology and
//! returned to the caller.

mod owner;
mod user;

use std::collections::HashSet;
use std::sync::Arc;

use database::Database;
use ledger::{
    Accounting, DepositEngine, LedgerError, PromoService, ReferralService, RequestLifecycle,
    Settings,
};
use tracing::{debug, error, info};

use crate::error::{BotError, Result};
use crate::limits::{Cooldowns, RateLimiter};
use crate::render;
use crate::sender::MessageSender;
use crate::update::{CallbackQuery, Command, Update};

/// Commands only owners may run.
pub const OWNER_COMMANDS: &[&str] = &[
    "pending",
    "approve",
    "reject",
    "addtoken",
    "reducetoken",
    "setprice",
    "setcost",
    "setmt",
    "setdeposit",
    "setpromo",
    "stats",
    "apistats",
];

/// Who is talking and where to answer.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub user_id: String,
    pub chat_id: String,
    pub owner: bool,
}

/// Routes chat commands to the ledger and renders the outcomes.
pub struct CommandHandler<S: MessageSender> {
    sender: Arc<S>,
    database: Database,
    settings: Settings,
    accounting: Accounting,
    lifecycle: RequestLifecycle,
    deposits: DepositEngine,
    promos: PromoService,
    referrals: ReferralService,
    owners: HashSet<String>,
    cooldowns: Cooldowns,
    rate_limiter: RateLimiter,
}

impl<S: MessageSender + 'static> CommandHandler<S> {
    pub fn new(
        sender: Arc<S>,
        database: Database,
        settings: Settings,
        lifecycle: RequestLifecycle,
        deposits: DepositEngine,
        owners: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            sender,
            accounting: Accounting::new(database.clone()),
            promos: PromoService::new(database.clone()),
            referrals: ReferralService::new(database.clone()),
            database,
            settings,
            lifecycle,
            deposits,
            owners: owners.into_iter().collect(),
            cooldowns: Cooldowns::default(),
            rate_limiter: RateLimiter::per_minute(30),
        }
    }

    /// Messages per user per minute. Owners are exempt.
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limiter = RateLimiter::per_minute(per_minute);
        self
    }

    pub fn with_cooldowns(mut self, cooldowns: Cooldowns) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    pub fn sender(&self) -> &Arc<S> {
        &self.sender
    }

    pub fn deposits(&self) -> &DepositEngine {
        &self.deposits
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owners.contains(user_id)
    }

    /// Drop stale cooldown and rate-limit entries.
    pub fn sweep_limits(&self) {
        let cooldowns = self.cooldowns.sweep();
        let windows = self.rate_limiter.sweep();
        debug!(cooldowns, windows, "Swept rate limit state");
    }

    /// Handle one inbound update.
    pub async fn handle(&self, update: Update) -> Result<()> {
        if let Some(query) = update.callback_query {
            return self.handle_button(query).await;
        }

        let Some(message) = update.message else {
            return Ok(());
        };
        let (Some(author), Some(text)) = (message.from.as_ref(), message.text.as_deref()) else {
            return Ok(());
        };
        let Some(command) = Command::parse(text) else {
            return Ok(());
        };

        let ctx = Context {
            user_id: author.user_id(),
            chat_id: message.chat.id.to_string(),
            owner: self.is_owner(&author.user_id()),
        };

        if !ctx.owner && !self.rate_limiter.check(&ctx.user_id) {
            debug!(user_id = %ctx.user_id, "Rate limited");
            return self
                .reply(&ctx.chat_id, "Too many requests. Please wait a moment.")
                .await;
        }

        info!(user_id = %ctx.user_id, command = %command.name, owner = ctx.owner, "Command received");
        self.accounting
            .ensure_user(
                &ctx.user_id,
                author.username.as_deref(),
                author.first_name.as_deref(),
            )
            .await?;

        match self.dispatch(&ctx, &command).await {
            Ok(()) => Ok(()),
            Err(BotError::Ledger(err)) => self.refuse(&ctx, &command.name, err).await,
            Err(e) => Err(e),
        }
    }

    async fn dispatch(&self, ctx: &Context, command: &Command) -> Result<()> {
        let name = command.name.as_str();
        let is_feature = self.lifecycle.has_feature(name);
        let owner_only = OWNER_COMMANDS.contains(&name);

        if owner_only && !ctx.owner {
            return self
                .reply(&ctx.chat_id, "Access denied: this command is for owners only.")
                .await;
        }

        if !ctx.owner {
            let key = if is_feature { "lookup" } else { name };
            if let Err(wait) = self.cooldowns.check(&ctx.user_id, key) {
                let text = format!(
                    "Please wait {}s before using /{} again.",
                    wait.as_secs().max(1),
                    name
                );
                return self.reply(&ctx.chat_id, &text).await;
            }
        }

        match name {
            "start" => self.start(ctx, command).await,
            "saldo" | "balance" => self.balance(ctx).await,
            "help" | "menu" => self.help(ctx).await,
            "deposit" => self.deposit(ctx, command).await,
            "cancel" => self.cancel(ctx, command).await,
            "riwayat" | "history" => self.history(ctx).await,
            "getdata" => self.get_data(ctx, command).await,
            "ref" | "myref" => self.referral(ctx).await,
            _ if is_feature => self.lookup(ctx, command).await,
            _ if owner_only => self.owner_command(ctx, command).await,
            _ => {
                self.reply(&ctx.chat_id, "Unknown command. Type /help for the list of commands.")
                    .await
            }
        }
    }

    /// Turn a ledger refusal into a reply; escalate storage failures.
    async fn refuse(&self, ctx: &Context, command: &str, err: LedgerError) -> Result<()> {
        match render::error_text(&err) {
            Some(text) => self.reply(&ctx.chat_id, &text).await,
            None => {
                error!(user_id = %ctx.user_id, command, error = %err, "Command failed");
                self.reply(&ctx.chat_id, "Something went wrong. Please try again later.")
                    .await?;
                Err(BotError::Ledger(err))
            }
        }
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sender.send_message(chat_id, text).await.map(|_| ())
    }

    async fn usage(&self, ctx: &Context, usage: &str) -> Result<()> {
        self.reply(&ctx.chat_id, &format!("Usage: {}", usage)).await
    }

    async fn handle_button(&self, query: CallbackQuery) -> Result<()> {
        let user_id = query.from.user_id();
        let data = query.data.as_deref().unwrap_or_default();

        let answer = if let Some(id) = data.strip_prefix("check_deposit_") {
            self.button_status(&user_id, id).await?
        } else if let Some(id) = data.strip_prefix("cancel_deposit_") {
            self.button_cancel(&user_id, id).await?
        } else {
            debug!(user_id = %user_id, data, "Ignoring unknown button");
            String::new()
        };

        self.sender.answer_callback(&query.id, &answer).await
    }

    async fn button_status(&self, user_id: &str, raw_id: &str) -> Result<String> {
        let Ok(deposit_id) = raw_id.parse::<i64>() else {
            return Ok("Deposit not found".to_string());
        };
        let deposit = match self.deposits.get(deposit_id).await {
            Ok(deposit) => deposit,
            Err(LedgerError::NotFound { .. }) => return Ok("Deposit not found".to_string()),
            Err(e) => return Err(e.into()),
        };
        if deposit.user_id != user_id && !self.is_owner(user_id) {
            return Ok("This is not your deposit".to_string());
        }
        Ok(format!(
            "Deposit #{}: {}",
            deposit.id,
            render::deposit_status(deposit.status)
        ))
    }

    async fn button_cancel(&self, user_id: &str, raw_id: &str) -> Result<String> {
        let Ok(deposit_id) = raw_id.parse::<i64>() else {
            return Ok("Deposit not found".to_string());
        };
        match self.deposits.cancel(user_id, deposit_id).await {
            Ok(true) => Ok(format!("Deposit #{} cancelled", deposit_id)),
            Ok(false) => Ok(format!("Deposit #{} is already closed", deposit_id)),
            Err(LedgerError::Forbidden(_)) => Ok("This is not your deposit".to_string()),
            Err(LedgerError::NotFound { .. }) => Ok("Deposit not found".to_string()),
            Err(e) => Err(e.into()),
        }
    }
}
