//! Plain-text rendering of ledger outcomes for chat.

use chrono::{DateTime, Utc};
use database::stats::{ApiStats, OverallStats};
use database::{Deposit, DepositStatus, LookupRequest, RequestStatus, Tokens, Transaction};
use ledger::{
    DepositOrder, LedgerError, LookupFailure, LookupOutcome, LookupResult, PollOutcome,
    PromoInfo, ReferralStats, SavedResult, SettledDeposit,
};
use serde_json::Value;

/// Chat messages are cut at this many characters.
const MAX_MESSAGE_CHARS: usize = 3500;

/// `50000` → `Rp 50.000`.
pub fn rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}Rp {}", sign, grouped)
}

/// Time left until an RFC 3339 expiry, e.g. `9m 05s`. `None` if unreadable,
/// `expired` if already past.
pub fn countdown(expires_at: &str, now: DateTime<Utc>) -> Option<String> {
    let expiry = DateTime::parse_from_rfc3339(expires_at).ok()?.with_timezone(&Utc);
    let left = (expiry - now).num_seconds();
    if left <= 0 {
        return Some("expired".to_string());
    }
    Some(format!("{}m {:02}s", left / 60, left % 60))
}

fn truncate(mut text: String) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        text = text.chars().take(MAX_MESSAGE_CHARS).collect();
        text.push_str("\n…");
    }
    text
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn write_value(out: &mut String, value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                match inner {
                    Value::Object(_) | Value::Array(_) => {
                        out.push_str(&format!("{}{}:\n", pad, key));
                        write_value(out, inner, indent + 1);
                    }
                    _ => out.push_str(&format!("{}{}: {}\n", pad, key, scalar(inner))),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(&format!("{}---\n", pad));
                }
                write_value(out, item, indent);
            }
        }
        other => out.push_str(&format!("{}{}\n", pad, scalar(other))),
    }
}

/// Provider payload as `key: value` lines.
pub fn payload(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out.trim_end().to_string()
}

/// Result of a priced lookup. Failures always state the refund.
pub fn lookup_outcome(outcome: &LookupOutcome) -> String {
    let header = format!("{} · {} · ID {}", outcome.feature, outcome.query, outcome.request_id);
    let body = match &outcome.result {
        LookupResult::Found { payload: data, .. } => {
            format!("{}\n\n{}\n\nCharged {} tokens", header, payload(data), outcome.price)
        }
        LookupResult::Cached {
            payload: data,
            cached_at,
            ..
        } => format!(
            "{}\n\n{}\n\nLive source unavailable, showing saved result from {}.\nCharged {} tokens",
            header,
            payload(data),
            cached_at,
            outcome.price
        ),
        LookupResult::Partial {
            payload: data,
            reason,
            refunded,
        } => format!(
            "{}\n\n{}\n\nPartial result: {}\nRefunded {} tokens, charged {}",
            header,
            payload(data),
            reason,
            refunded,
            outcome.charged()
        ),
        LookupResult::Failed { reason, refunded } => {
            let why = match reason {
                LookupFailure::EmptyResult(_) => "No data found.".to_string(),
                LookupFailure::ProviderTimeout => "The data source timed out.".to_string(),
                LookupFailure::ProviderFailure(msg) => format!("The data source failed: {}", msg),
            };
            format!("{}\n\nLookup failed. {}\nRefunded {} tokens", header, why, refunded)
        }
    };
    truncate(format!("{}\nBalance: {} tokens", body, outcome.balance))
}

/// A saved result re-read with `/getdata`.
pub fn saved_result(saved: &SavedResult) -> String {
    truncate(format!(
        "{} · {} · ID {}\n\n{}\n\nCharged {} tokens\nBalance: {} tokens",
        saved.request.command,
        saved.request.query,
        saved.request.request_id,
        payload(&saved.payload),
        saved.charged,
        saved.balance
    ))
}

/// User-facing text for a refused operation. `None` for storage errors,
/// which are not the user's to see.
pub fn error_text(err: &LedgerError) -> Option<String> {
    let text = match err {
        LedgerError::MaintenanceActive(what) => {
            format!("{} is under maintenance. Please try again later.", what)
        }
        LedgerError::InsufficientBalance {
            required,
            available,
        } => format!(
            "Insufficient balance: this needs {} tokens, you have {}.\nTop up with /deposit",
            required, available
        ),
        LedgerError::UnknownFeature(name) => format!("Unknown feature: {}", name),
        LedgerError::InvalidAmount(msg) => format!("Invalid amount: {}", msg),
        LedgerError::InvalidPromo(msg) => format!("Promo code not usable: {}", msg),
        LedgerError::AlreadyReferred => "You already have a referrer.".to_string(),
        LedgerError::InvalidReferral(msg) => format!("Referral code not usable: {}", msg),
        LedgerError::NotFound { entity, id } => format!("{} {} not found.", entity, id),
        LedgerError::Forbidden(_) => "That belongs to someone else.".to_string(),
        LedgerError::GatewayUnavailable(_) => {
            "The payment service is unavailable. Please try again shortly.".to_string()
        }
        LedgerError::Validation(e) => format!("Invalid input: {}", e),
        LedgerError::Storage(_) => return None,
    };
    Some(text)
}

/// Payment instructions for a new order, with a countdown to expiry.
pub fn deposit_order(order: &DepositOrder, now: DateTime<Utc>) -> String {
    let deposit = &order.deposit;
    let mut lines = vec![
        format!("Deposit #{}", deposit.id),
        format!("Tokens: {}", deposit.token_amount),
        format!("Pay: {}", rupiah(deposit.amount)),
        format!("Order: {}", deposit.order_id),
    ];

    if let Some(promo) = &order.promo {
        let how = if promo.auto_selected { "auto-applied" } else { "applied" };
        lines.push(format!(
            "Promo {} ({}%, {}): +{} bonus tokens",
            promo.code, promo.bonus_percent, how, promo.bonus_tokens
        ));
        lines.push(format!(
            "You will receive {} tokens",
            deposit.token_amount + promo.bonus_tokens
        ));
    }

    match deposit.expires_at.as_deref().and_then(|e| countdown(e, now)) {
        Some(left) => lines.push(format!("Expires in {}", left)),
        None => lines.push("Awaiting confirmation".to_string()),
    }
    if let Some(url) = &deposit.checkout_url {
        lines.push(format!("Checkout: {}", url));
    }
    lines.push("Tokens are credited automatically once payment is received.".to_string());
    lines.join("\n")
}

/// Confirmation of a settled deposit with its bonus breakdown.
pub fn settled(settled: &SettledDeposit) -> String {
    let mut lines = vec![
        format!("Deposit #{} received", settled.deposit_id),
        format!("Deposit: +{} tokens", settled.tokens),
    ];
    if let Some(code) = &settled.promo_code {
        lines.push(format!("Promo {} bonus: +{} tokens", code, settled.promo_bonus));
    }
    lines.push(format!("Total credited: {} tokens", settled.total_credited()));
    lines.push(format!("Balance: {} tokens", settled.balance));
    lines.join("\n")
}

/// Message to a referrer whose invitee just qualified.
pub fn referral_paid(referred_id: &str, bonus: i64) -> String {
    format!(
        "Referral bonus: +{} tokens. User {} made their first qualifying deposit.",
        bonus, referred_id
    )
}

/// Message for a finished poller, if the user should hear about it.
pub fn poll_outcome(outcome: &PollOutcome, deposit: &Deposit) -> Option<String> {
    match outcome {
        PollOutcome::Settled(done) => Some(settled(done)),
        PollOutcome::Expired | PollOutcome::TimedOut => Some(format!(
            "Deposit #{} expired without payment. Create a new one with /deposit",
            deposit.id
        )),
        PollOutcome::AlreadySettled | PollOutcome::Rejected => None,
    }
}

pub fn deposit_status(status: DepositStatus) -> &'static str {
    match status {
        DepositStatus::Pending => "waiting for payment",
        DepositStatus::Approved => "approved",
        DepositStatus::Rejected => "rejected or expired",
    }
}

/// One line per pending deposit, for owners.
pub fn pending_deposits(deposits: &[Deposit]) -> String {
    if deposits.is_empty() {
        return "No pending deposits.".to_string();
    }
    let mut lines = vec![format!("{} pending deposit(s):", deposits.len())];
    for d in deposits {
        let promo = d
            .promo_code
            .as_deref()
            .map(|code| format!(" +{} ({})", d.promo_bonus, code))
            .unwrap_or_default();
        lines.push(format!(
            "#{} · user {} · {} tokens{} · {} · {}",
            d.id,
            d.user_id,
            d.token_amount,
            promo,
            rupiah(d.amount),
            d.created_at
        ));
    }
    lines.join("\n")
}

pub fn balance(balance: Tokens, total_checks: i64) -> String {
    format!("Balance: {} tokens\nLookups so far: {}", balance, total_checks)
}

fn status_label(request: &LookupRequest) -> &'static str {
    match request.status {
        RequestStatus::Success if request.from_cache => "cached",
        RequestStatus::Success => "ok",
        RequestStatus::Partial => "partial",
        RequestStatus::Failed => "failed",
        RequestStatus::Pending => "pending",
    }
}

/// Request history with ids for `/getdata`.
pub fn history(requests: &[LookupRequest], days: i64) -> String {
    if requests.is_empty() {
        return format!("No lookups in the last {} days.", days);
    }
    let mut lines = vec![format!("Lookups in the last {} days:", days)];
    for r in requests {
        lines.push(format!(
            "{} · {} {} · {} · {} tokens · {}",
            r.request_id,
            r.command,
            r.query,
            status_label(r),
            r.token_cost,
            r.created_at
        ));
    }
    lines.push("Re-open a result with /getdata <ID>".to_string());
    lines.join("\n")
}

pub fn transactions(entries: &[Transaction]) -> String {
    entries
        .iter()
        .map(|t| format!("{} {:?} {} {}", t.created_at, t.kind, t.amount, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn referral_stats(stats: &ReferralStats, bonus: i64, min_deposit: i64) -> String {
    format!(
        "Your referral code: {}\nShare: /start {}\n\nReferred users: {}\nWaiting for first deposit: {}\nEarned: {} tokens\n\nYou earn {} tokens when someone you invite deposits at least {} tokens.",
        stats.code, stats.code, stats.total_referred, stats.pending_bonus, stats.total_earned, bonus, min_deposit
    )
}

pub fn promo_info(info: &PromoInfo) -> String {
    let p = &info.promo;
    let uses = if p.max_uses == 0 {
        format!("{} (unlimited)", p.current_uses)
    } else {
        format!("{}/{}", p.current_uses, p.max_uses)
    };
    let state = if !p.is_active {
        "inactive"
    } else if info.expired {
        "expired"
    } else if p.is_exhausted() {
        "used up"
    } else {
        "active"
    };
    format!(
        "{} · {}% bonus · min {} tokens\nUses: {} ({} redemptions)\nExpires: {}\nState: {}",
        p.code,
        p.bonus_percent,
        p.min_deposit,
        uses,
        info.usages,
        p.expires_at.as_deref().unwrap_or("never"),
        state
    )
}

pub fn overall_stats(stats: &OverallStats) -> String {
    format!(
        "Users: {} (+{} today)\nDeposits: {} approved, {} pending, {} rejected\nRevenue: {}\nTokens sold: {}\nLookups: {}",
        stats.total_users,
        stats.new_users_today,
        stats.approved_deposits,
        stats.pending_deposits,
        stats.rejected_deposits,
        rupiah(stats.total_deposit_amount),
        stats.total_tokens_sold,
        stats.total_checks
    )
}

pub fn api_stats(stats: &ApiStats) -> String {
    let table = |rows: &[database::stats::FeatureUsage]| {
        if rows.is_empty() {
            return "  none".to_string();
        }
        rows.iter()
            .map(|r| format!("  {}: {} requests, {} tokens", r.command, r.count, r.tokens))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Today:\n{}\nAll time:\n{}", table(&stats.today), table(&stats.total))
}
