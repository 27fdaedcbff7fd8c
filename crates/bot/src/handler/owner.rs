//! Owner-only administration commands.

use database::stats;
use ledger::{LedgerError, SettleOutcome, Tokens};
use tracing::{info, warn};

use super::{CommandHandler, Context};
use crate::error::Result;
use crate::notify;
use crate::render;
use crate::sender::MessageSender;
use crate::update::Command;

const PROMO_USAGE: &str = "/setpromo add <CODE> <percent> [min tokens] [max uses] [days]\n\
/setpromo list | info <CODE> | on <CODE> | off <CODE> | delete <CODE>";

fn parse_id(command: &Command) -> Option<i64> {
    command.arg(0).and_then(|a| a.parse().ok())
}

fn parse_switch(value: Option<&str>) -> Option<bool> {
    match value?.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl<S: MessageSender + 'static> CommandHandler<S> {
    pub(super) async fn owner_command(&self, ctx: &Context, command: &Command) -> Result<()> {
        match command.name.as_str() {
            "pending" => {
                let pending = self.deposits.list_pending().await?;
                self.reply(&ctx.chat_id, &render::pending_deposits(&pending))
                    .await
            }
            "approve" => self.approve(ctx, command).await,
            "reject" => self.reject(ctx, command).await,
            "addtoken" | "reducetoken" => self.adjust_tokens(ctx, command).await,
            "setprice" => {
                let Some(price) = parse_id(command).filter(|p| *p > 0) else {
                    return self.usage(ctx, "/setprice <fiat per token>").await;
                };
                self.settings.set_token_price(price).await?;
                info!(admin = %ctx.user_id, price, "Token price changed");
                self.reply(&ctx.chat_id, &format!("Token price set to {}", render::rupiah(price)))
                    .await
            }
            "setdeposit" => {
                let Some(amount) = parse_id(command).filter(|a| *a > 0) else {
                    return self.usage(ctx, "/setdeposit <minimum fiat>").await;
                };
                self.settings.set_min_deposit(amount).await?;
                let tokens = self.settings.min_topup_tokens().await?;
                info!(admin = %ctx.user_id, amount, "Minimum deposit changed");
                self.reply(
                    &ctx.chat_id,
                    &format!(
                        "Minimum deposit set to {} ({} tokens)",
                        render::rupiah(amount),
                        tokens
                    ),
                )
                .await
            }
            "setcost" => self.set_cost(ctx, command).await,
            "setmt" => self.set_maintenance(ctx, command).await,
            "setpromo" => self.promo_admin(ctx, command).await,
            "stats" => {
                let overall = stats::overall(self.database.pool())
                    .await
                    .map_err(LedgerError::from)?;
                self.reply(&ctx.chat_id, &render::overall_stats(&overall))
                    .await
            }
            "apistats" => {
                let usage = stats::api_usage(self.database.pool())
                    .await
                    .map_err(LedgerError::from)?;
                self.reply(&ctx.chat_id, &render::api_stats(&usage)).await
            }
            other => {
                warn!(command = other, "Owner command without a handler");
                self.reply(&ctx.chat_id, "Unknown command.").await
            }
        }
    }

    async fn approve(&self, ctx: &Context, command: &Command) -> Result<()> {
        let Some(deposit_id) = parse_id(command) else {
            return self.usage(ctx, "/approve <deposit id>").await;
        };

        match self.deposits.approve(deposit_id, &ctx.user_id).await? {
            SettleOutcome::Settled(done) => {
                self.reply(
                    &ctx.chat_id,
                    &format!(
                        "Approved deposit #{}: {} tokens credited to {}.",
                        done.deposit_id,
                        done.total_credited(),
                        done.user_id
                    ),
                )
                .await?;
                notify::settled(self.sender.as_ref(), &done).await;
                Ok(())
            }
            SettleOutcome::AlreadySettled(status) => {
                self.reply(
                    &ctx.chat_id,
                    &format!(
                        "Deposit #{} is already {}.",
                        deposit_id,
                        render::deposit_status(status)
                    ),
                )
                .await
            }
        }
    }

    async fn reject(&self, ctx: &Context, command: &Command) -> Result<()> {
        let Some(deposit_id) = parse_id(command) else {
            return self.usage(ctx, "/reject <deposit id>").await;
        };

        if !self.deposits.reject(deposit_id, &ctx.user_id).await? {
            let deposit = self.deposits.get(deposit_id).await?;
            let text = format!(
                "Deposit #{} is already {}.",
                deposit_id,
                render::deposit_status(deposit.status)
            );
            return self.reply(&ctx.chat_id, &text).await;
        }

        let deposit = self.deposits.get(deposit_id).await?;
        self.reply(&ctx.chat_id, &format!("Rejected deposit #{}.", deposit_id))
            .await?;
        if let Err(e) = self
            .sender
            .send_message(
                &deposit.user_id,
                &format!("Your deposit #{} was rejected.", deposit_id),
            )
            .await
        {
            warn!(deposit_id, error = %e, "Could not send rejection notice");
        }
        Ok(())
    }

    async fn adjust_tokens(&self, ctx: &Context, command: &Command) -> Result<()> {
        let adding = command.name == "addtoken";
        let parsed = command
            .arg(0)
            .zip(command.arg(1).and_then(|a| a.parse::<Tokens>().ok()));
        let Some((target, amount)) = parsed else {
            return self
                .usage(ctx, &format!("/{} <user id> <tokens>", command.name))
                .await;
        };

        let (balance, notice) = if adding {
            let balance = self.accounting.add_tokens(target, amount, &ctx.user_id).await?;
            (balance, format!("An admin added {} tokens to your balance.", amount))
        } else {
            let balance = self
                .accounting
                .reduce_tokens(target, amount, &ctx.user_id)
                .await?;
            (balance, format!("An admin removed {} tokens from your balance.", amount))
        };

        self.reply(
            &ctx.chat_id,
            &format!("Done. {} now has {} tokens.", target, balance),
        )
        .await?;
        let notice = format!("{}\nBalance: {} tokens", notice, balance);
        if let Err(e) = self.sender.send_message(target, &notice).await {
            warn!(user_id = target, error = %e, "Could not send balance notice");
        }
        Ok(())
    }

    async fn set_cost(&self, ctx: &Context, command: &Command) -> Result<()> {
        let feature = command.arg(0).map(str::to_lowercase);
        let cost = command.arg(1).and_then(|a| a.parse::<Tokens>().ok());
        let (Some(feature), Some(cost)) = (feature, cost) else {
            return self.usage(ctx, "/setcost <feature> <tokens>").await;
        };
        if !self.lifecycle.has_feature(&feature) {
            return Err(LedgerError::UnknownFeature(feature).into());
        }
        if cost < Tokens::ZERO {
            return Err(LedgerError::InvalidAmount("cost cannot be negative".to_string()).into());
        }

        self.settings.set_feature_cost(&feature, cost).await?;
        info!(admin = %ctx.user_id, feature = %feature, %cost, "Feature cost changed");
        self.reply(&ctx.chat_id, &format!("/{} now costs {} tokens.", feature, cost))
            .await
    }

    async fn set_maintenance(&self, ctx: &Context, command: &Command) -> Result<()> {
        let target = command.arg(0).map(str::to_lowercase);
        let (Some(target), Some(on)) = (target, parse_switch(command.arg(1))) else {
            return self.usage(ctx, "/setmt <feature|all> <on|off>").await;
        };
        let state = if on { "on" } else { "off" };

        if target == "all" {
            self.settings.set_global_maintenance(on).await?;
            info!(admin = %ctx.user_id, on, "Global maintenance switched");
            return self
                .reply(&ctx.chat_id, &format!("Global maintenance {}.", state))
                .await;
        }

        if !self.lifecycle.has_feature(&target) {
            return Err(LedgerError::UnknownFeature(target).into());
        }
        self.settings.set_feature_maintenance(&target, on).await?;
        info!(admin = %ctx.user_id, feature = %target, on, "Feature maintenance switched");
        self.reply(&ctx.chat_id, &format!("Maintenance for /{} {}.", target, state))
            .await
    }

    async fn promo_admin(&self, ctx: &Context, command: &Command) -> Result<()> {
        let code = command.arg(1);
        let text = match (command.arg(0), code) {
            (Some("add"), Some(code)) => {
                let number = |i: usize, default: i64| -> Option<i64> {
                    match command.arg(i) {
                        None => Some(default),
                        Some(raw) => raw.parse().ok(),
                    }
                };
                let (Some(percent), Some(min), Some(max_uses)) =
                    (command.arg(2).and_then(|a| a.parse::<i64>().ok()), number(3, 0), number(4, 0))
                else {
                    return self.usage(ctx, PROMO_USAGE).await;
                };
                let days = match command.arg(5) {
                    None => None,
                    Some(raw) => match raw.parse::<i64>() {
                        Ok(days) if days > 0 => Some(days),
                        _ => return self.usage(ctx, PROMO_USAGE).await,
                    },
                };

                let promo = self
                    .promos
                    .create(code, percent, min, max_uses, days, &ctx.user_id)
                    .await?;
                let info = self.promos.info(&promo.code).await?;
                format!("Promo created.\n{}", render::promo_info(&info))
            }
            (Some("list"), _) => {
                let promos = self.promos.list().await?;
                if promos.is_empty() {
                    "No promos.".to_string()
                } else {
                    promos
                        .iter()
                        .map(|p| {
                            let state = if p.is_active { "on" } else { "off" };
                            format!(
                                "{} · {}% · min {} · {}/{} · {}",
                                p.code,
                                p.bonus_percent,
                                p.min_deposit,
                                p.current_uses,
                                if p.max_uses == 0 {
                                    "∞".to_string()
                                } else {
                                    p.max_uses.to_string()
                                },
                                state
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            (Some("info"), Some(code)) => render::promo_info(&self.promos.info(code).await?),
            (Some(switch @ ("on" | "off")), Some(code)) => {
                let on = switch == "on";
                self.promos.set_active(code, on).await?;
                format!("Promo {} switched {}.", code.to_uppercase(), switch)
            }
            (Some("delete"), Some(code)) => {
                self.promos.delete(code).await?;
                format!("Promo {} deleted.", code.to_uppercase())
            }
            _ => return self.usage(ctx, PROMO_USAGE).await,
        };
        self.reply(&ctx.chat_id, &text).await
    }
}
