//! Commands anyone can run.

use chrono::Utc;
use database::validation::{validate_digit_id, validate_query};
use ledger::{LedgerError, Tokens};
use tracing::info;

use super::{CommandHandler, Context, OWNER_COMMANDS};
use crate::error::Result;
use crate::notify;
use crate::render;
use crate::sender::{Button, MessageSender};
use crate::update::Command;

/// Features queried by a 16-digit national id.
const NIK_FEATURES: &[&str] = &["ceknik", "kk", "foto", "edabu", "bpjstk", "regnik"];

const RECENT_TRANSACTIONS: i64 = 5;

impl<S: MessageSender + 'static> CommandHandler<S> {
    pub(super) async fn start(&self, ctx: &Context, command: &Command) -> Result<()> {
        let mut lines = Vec::new();

        if let Some(arg) = command.arg(0) {
            let code = arg.strip_prefix("ref_").unwrap_or(arg);
            match self.referrals.register(&ctx.user_id, code).await {
                Ok(referrer) => {
                    info!(user_id = %ctx.user_id, referrer = %referrer, "Referral registered");
                    lines.push("Referral code applied. Welcome aboard!".to_string());
                }
                Err(err @ (LedgerError::AlreadyReferred | LedgerError::InvalidReferral(_))) => {
                    if let Some(text) = render::error_text(&err) {
                        lines.push(text);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        let balance = self.accounting.balance(&ctx.user_id).await?;
        lines.push(format!("Welcome! Your balance is {} tokens.", balance));
        lines.push("Type /help to see what you can look up.".to_string());
        self.reply(&ctx.chat_id, &lines.join("\n")).await
    }

    pub(super) async fn balance(&self, ctx: &Context) -> Result<()> {
        let user = database::user::get_user(self.database.pool(), &ctx.user_id)
            .await
            .map_err(LedgerError::from)?;
        let recent = self
            .accounting
            .recent_transactions(&ctx.user_id, RECENT_TRANSACTIONS)
            .await?;

        let mut text = render::balance(user.token_balance, user.total_checks);
        if !recent.is_empty() {
            text.push_str("\n\nRecent activity:\n");
            text.push_str(&render::transactions(&recent));
        }
        self.reply(&ctx.chat_id, &text).await
    }

    pub(super) async fn help(&self, ctx: &Context) -> Result<()> {
        let mut lines = vec!["Lookups:".to_string()];
        for feature in self.lifecycle.features() {
            let cost = self.settings.feature_cost(feature).await?;
            let state = if self.settings.feature_in_maintenance(feature).await? {
                " (maintenance)"
            } else {
                ""
            };
            lines.push(format!("/{} <query> · {} tokens{}", feature, cost, state));
        }

        let getdata = self.settings.getdata_cost().await?;
        lines.push(String::new());
        lines.push("Account:".to_string());
        lines.push("/saldo · balance and recent activity".to_string());
        lines.push("/deposit <tokens> [promo] · buy tokens".to_string());
        lines.push("/cancel <deposit id> · cancel a pending deposit".to_string());
        lines.push("/riwayat · lookup history".to_string());
        lines.push(format!("/getdata <ID> · re-open a result ({} tokens)", getdata));
        lines.push("/ref · your referral code".to_string());

        if ctx.owner {
            lines.push(String::new());
            lines.push(format!(
                "Owner: {}",
                OWNER_COMMANDS
                    .iter()
                    .map(|c| format!("/{}", c))
                    .collect::<Vec<_>>()
                    .join(" ")
            ));
        }
        self.reply(&ctx.chat_id, &lines.join("\n")).await
    }

    pub(super) async fn lookup(&self, ctx: &Context, command: &Command) -> Result<()> {
        let feature = command.name.as_str();
        let raw = command.rest(0);
        if raw.is_empty() {
            return self.usage(ctx, &format!("/{} <query>", feature)).await;
        }

        let query = if NIK_FEATURES.contains(&feature) {
            validate_digit_id("NIK", &raw, 16).map_err(LedgerError::from)?
        } else {
            validate_query(&raw).map_err(LedgerError::from)?.to_string()
        };

        let progress = self
            .sender
            .send_message(&ctx.chat_id, &format!("Searching {}...", feature))
            .await?;

        let text = match self.lifecycle.lookup(&ctx.user_id, feature, &query).await {
            Ok(outcome) => render::lookup_outcome(&outcome),
            Err(err) => match render::error_text(&err) {
                Some(text) => text,
                None => return Err(err.into()),
            },
        };
        self.sender.edit_message(&ctx.chat_id, progress, &text).await
    }

    pub(super) async fn deposit(&self, ctx: &Context, command: &Command) -> Result<()> {
        let Some(tokens) = command.arg(0).and_then(|a| a.parse::<i64>().ok()) else {
            return self.deposit_usage(ctx).await;
        };

        let order = self
            .deposits
            .create_order(&ctx.user_id, tokens, command.arg(1))
            .await?;
        let deposit = order.deposit.clone();

        let caption = render::deposit_order(&order, Utc::now());
        let buttons = [
            Button::new("Check status", format!("check_deposit_{}", deposit.id)),
            Button::new("Cancel", format!("cancel_deposit_{}", deposit.id)),
        ];
        let photo = deposit.pay_ref.as_deref().unwrap_or(&deposit.order_id);
        self.sender
            .send_photo(&ctx.chat_id, photo, &caption, &buttons)
            .await?;

        let poller = self.deposits.spawn_poller(deposit.id);
        notify::watch_deposit(self.sender.clone(), deposit, poller);
        Ok(())
    }

    async fn deposit_usage(&self, ctx: &Context) -> Result<()> {
        let min_tokens = self.settings.min_topup_tokens().await?;
        let price = self.settings.token_price().await?;

        let mut lines = vec![
            "Usage: /deposit <tokens> [promo code]".to_string(),
            format!("Price: {} per token", render::rupiah(price)),
            format!("Minimum: {} tokens", min_tokens),
        ];
        let promos = self.promos.list_active().await?;
        if !promos.is_empty() {
            lines.push("Active promos:".to_string());
            for p in promos {
                lines.push(format!(
                    "{} · +{}% · min {} tokens",
                    p.code, p.bonus_percent, p.min_deposit
                ));
            }
        }
        self.reply(&ctx.chat_id, &lines.join("\n")).await
    }

    pub(super) async fn cancel(&self, ctx: &Context, command: &Command) -> Result<()> {
        let Some(deposit_id) = command.arg(0).and_then(|a| a.parse::<i64>().ok()) else {
            return self.usage(ctx, "/cancel <deposit id>").await;
        };

        let text = if self.deposits.cancel(&ctx.user_id, deposit_id).await? {
            format!("Deposit #{} cancelled.", deposit_id)
        } else {
            let deposit = self.deposits.get(deposit_id).await?;
            format!(
                "Deposit #{} is already {}.",
                deposit_id,
                render::deposit_status(deposit.status)
            )
        };
        self.reply(&ctx.chat_id, &text).await
    }

    pub(super) async fn history(&self, ctx: &Context) -> Result<()> {
        let requests = self.lifecycle.history(&ctx.user_id).await?;
        let days = self.settings.history_days().await?;
        self.reply(&ctx.chat_id, &render::history(&requests, days)).await
    }

    pub(super) async fn get_data(&self, ctx: &Context, command: &Command) -> Result<()> {
        let Some(request_id) = command.arg(0) else {
            let cost: Tokens = self.settings.getdata_cost().await?;
            return self
                .usage(ctx, &format!("/getdata <ID> ({} tokens, IDs from /riwayat)", cost))
                .await;
        };

        let saved = self
            .lifecycle
            .fetch_saved(&ctx.user_id, &request_id.to_ascii_uppercase())
            .await?;
        self.reply(&ctx.chat_id, &render::saved_result(&saved)).await
    }

    pub(super) async fn referral(&self, ctx: &Context) -> Result<()> {
        let stats = self.referrals.stats(&ctx.user_id).await?;
        let bonus = self.settings.referral_bonus().await?;
        let min_deposit = self.settings.referral_min_deposit().await?;
        self.reply(&ctx.chat_id, &render::referral_stats(&stats, bonus, min_deposit))
            .await
    }
}
