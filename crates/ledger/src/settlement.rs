//! Deposit orders and exactly-once settlement.
//!
//! A deposit leaves `pending` once. Approval is a compare-and-swap on the
//! status column, run in the same SQLite transaction as the credit, the
//! promo bonus and the referral payout, so whichever of the poller, the
//! webhook or an admin gets there first credits the user and every other
//! caller sees [`SettleOutcome::AlreadySettled`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use database::{
    balance, deposit as deposit_store, promo as promo_store, referral as referral_store, user,
    validation, Database, Deposit, DepositStatus, NewDeposit, PaymentMethod, Tokens,
    TransactionKind,
};
use provider_core::{PaymentGateway, PaymentStatus};
use sqlx::SqliteConnection;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::accounting::credit_with_entry;
use crate::error::{LedgerError, Result};
use crate::ids;
use crate::promo::PromoService;
use crate::settings::Settings;

/// Approver recorded when the poller sees the payment.
pub const SYSTEM_AUTO: &str = "SYSTEM_AUTO";
/// Approver recorded when the payment webhook settles an order.
pub const WEBHOOK: &str = "WEBHOOK";
/// Recorded when the gateway reports the order expired.
pub const SYSTEM_EXPIRED: &str = "SYSTEM_EXPIRED";
/// Recorded when polling gives up.
pub const SYSTEM_TIMEOUT: &str = "SYSTEM_TIMEOUT";
/// Recorded when the owner cancels.
pub const USER_CANCELLED: &str = "USER_CANCELLED";

const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// A promo attached to a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPromo {
    pub code: String,
    pub bonus_percent: i64,
    /// Whole tokens promised on settlement.
    pub bonus_tokens: i64,
    /// Picked automatically because no code was given.
    pub auto_selected: bool,
}

/// A freshly created pending deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositOrder {
    pub deposit: Deposit,
    pub promo: Option<AppliedPromo>,
}

/// Referrer payout made during a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralPayout {
    pub referrer_id: String,
    /// Whole tokens.
    pub bonus: i64,
}

/// What a winning settlement credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledDeposit {
    pub deposit_id: i64,
    pub order_id: String,
    pub user_id: String,
    pub tokens: i64,
    /// Zero when there was no promo or its cap was hit before settlement.
    pub promo_bonus: i64,
    pub promo_code: Option<String>,
    pub referral: Option<ReferralPayout>,
    /// The depositor's balance after the credit.
    pub balance: Tokens,
}

impl SettledDeposit {
    /// Deposit plus promo bonus.
    pub fn total_credited(&self) -> i64 {
        self.tokens + self.promo_bonus
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call won the transition and credited the user.
    Settled(SettledDeposit),
    /// Someone else concluded the deposit first; nothing was credited.
    AlreadySettled(DepositStatus),
}

/// How a poller finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Payment seen; this poller credited the user.
    Settled(SettledDeposit),
    /// Another path (webhook, admin) approved it first.
    AlreadySettled,
    /// The gateway reported the order expired.
    Expired,
    /// Cancelled by the user or rejected by an admin.
    Rejected,
    /// The polling window ran out.
    TimedOut,
}

/// Deposits touched by [`DepositEngine::resume_pending`].
#[derive(Debug)]
pub struct ResumedDeposits {
    /// Past their window; rejected.
    pub expired: Vec<Deposit>,
    /// Still open, each with a fresh poller.
    pub polling: Vec<(Deposit, JoinHandle<Result<PollOutcome>>)>,
}

/// Creates deposit orders and settles them.
#[derive(Clone)]
pub struct DepositEngine {
    database: Database,
    settings: Settings,
    gateway: Arc<dyn PaymentGateway>,
    promos: PromoService,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl DepositEngine {
    pub fn new(database: Database, settings: Settings, gateway: Arc<dyn PaymentGateway>) -> Self {
        let poll_interval = settings.defaults().poll_interval;
        let poll_timeout = settings.defaults().poll_timeout;
        Self {
            promos: PromoService::new(database.clone()),
            database,
            settings,
            gateway,
            poll_interval,
            poll_timeout,
        }
    }

    /// Override the poll interval and total polling window.
    pub fn with_poll_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    /// Create a pending gateway deposit for `token_amount` whole tokens.
    ///
    /// With no `promo_code`, the redeemable promo giving the largest bonus
    /// is attached automatically. If the gateway call fails nothing is
    /// stored and the caller should retry.
    pub async fn create_order(
        &self,
        user_id: &str,
        token_amount: i64,
        promo_code: Option<&str>,
    ) -> Result<DepositOrder> {
        let amount = self.check_amount(user_id, token_amount).await?;
        let promo = self.resolve_promo(token_amount, promo_code).await?;

        let order_id = ids::order_id(&self.settings.defaults().order_id_prefix, user_id);
        let order = self.gateway.create_order(&order_id, amount).await.map_err(|e| {
            warn!(user_id, order_id = %order_id, error = %e, "Gateway order creation failed");
            LedgerError::GatewayUnavailable(e)
        })?;
        let expires_at = order.expires_at.map(|t| t.to_rfc3339());

        let (promo_id, promo_code, promo_bonus) = match &promo {
            Some((id, applied)) => (Some(*id), Some(applied.code.as_str()), applied.bonus_tokens),
            None => (None, None, 0),
        };

        let deposit_id = deposit_store::insert_deposit(
            self.database.pool(),
            &NewDeposit {
                user_id,
                amount,
                token_amount,
                payment_method: PaymentMethod::Gateway,
                order_id: &order_id,
                pay_ref: Some(&order.pay_ref),
                checkout_url: order.checkout_url.as_deref(),
                expires_at: expires_at.as_deref(),
                promo_id,
                promo_code,
                promo_bonus,
            },
        )
        .await?;
        let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;

        info!(
            user_id,
            deposit_id,
            order_id = %deposit.order_id,
            amount,
            token_amount,
            promo_bonus,
            gateway = self.gateway.name(),
            "Deposit order created"
        );

        Ok(DepositOrder {
            deposit,
            promo: promo.map(|(_, applied)| applied),
        })
    }

    /// Create a pending deposit paid outside the gateway and approved by an
    /// admin. Promos apply the same way.
    pub async fn create_manual_order(
        &self,
        user_id: &str,
        token_amount: i64,
        promo_code: Option<&str>,
    ) -> Result<DepositOrder> {
        let amount = self.check_amount(user_id, token_amount).await?;
        let promo = self.resolve_promo(token_amount, promo_code).await?;
        let order_id = ids::order_id(&self.settings.defaults().order_id_prefix, user_id);

        let (promo_id, promo_code, promo_bonus) = match &promo {
            Some((id, applied)) => (Some(*id), Some(applied.code.as_str()), applied.bonus_tokens),
            None => (None, None, 0),
        };

        let deposit_id = deposit_store::insert_deposit(
            self.database.pool(),
            &NewDeposit {
                user_id,
                amount,
                token_amount,
                payment_method: PaymentMethod::Manual,
                order_id: &order_id,
                pay_ref: None,
                checkout_url: None,
                expires_at: None,
                promo_id,
                promo_code,
                promo_bonus,
            },
        )
        .await?;
        let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;

        info!(user_id, deposit_id, amount, token_amount, "Manual deposit created");
        Ok(DepositOrder {
            deposit,
            promo: promo.map(|(_, applied)| applied),
        })
    }

    /// Validate a top-up and return its fiat price.
    async fn check_amount(&self, user_id: &str, token_amount: i64) -> Result<i64> {
        validation::validate_token_amount(token_amount)?;
        user::get_user(self.database.pool(), user_id).await?;

        let min_tokens = self.settings.min_topup_tokens().await?;
        if token_amount < min_tokens {
            return Err(LedgerError::InvalidAmount(format!(
                "minimum top-up is {} tokens",
                min_tokens
            )));
        }

        let price = self.settings.token_price().await?;
        token_amount
            .checked_mul(price)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{} tokens is too many", token_amount)))
    }

    async fn resolve_promo(
        &self,
        token_amount: i64,
        promo_code: Option<&str>,
    ) -> Result<Option<(i64, AppliedPromo)>> {
        match promo_code {
            Some(code) => {
                let promo = self.promos.validate(code, token_amount).await?;
                let bonus_tokens = crate::promo::bonus_for(&promo, token_amount);
                Ok(Some((
                    promo.id,
                    AppliedPromo {
                        code: promo.code,
                        bonus_percent: promo.bonus_percent,
                        bonus_tokens,
                        auto_selected: false,
                    },
                )))
            }
            None => Ok(self
                .promos
                .best_for(token_amount)
                .await?
                .map(|(promo, bonus_tokens)| {
                    (
                        promo.id,
                        AppliedPromo {
                            code: promo.code,
                            bonus_percent: promo.bonus_percent,
                            bonus_tokens,
                            auto_selected: true,
                        },
                    )
                })),
        }
    }

    /// Approve a pending deposit and credit it, exactly once.
    ///
    /// The status swap, the deposit credit, the promo bonus and the
    /// referral payout commit together. A promo whose cap was reached after
    /// the order was created is skipped; the deposit still settles.
    pub async fn settle(&self, deposit_id: i64, approved_by: &str) -> Result<SettleOutcome> {
        let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
        if deposit.status != DepositStatus::Pending {
            debug!(deposit_id, status = deposit.status.as_str(), "Deposit already concluded");
            return Ok(SettleOutcome::AlreadySettled(deposit.status));
        }

        let referral_bonus = self.settings.referral_bonus().await?;
        let referral_min_deposit = self.settings.referral_min_deposit().await?;

        let mut tx = self.database.pool().begin().await?;

        if !deposit_store::transition_from_pending(
            &mut *tx,
            deposit_id,
            DepositStatus::Approved,
            Some(approved_by),
        )
        .await?
        {
            tx.rollback().await?;
            let current = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
            debug!(deposit_id, approved_by, "Lost settlement race");
            return Ok(SettleOutcome::AlreadySettled(current.status));
        }

        let description = format!("Deposit of {} tokens", deposit.token_amount);
        credit_with_entry(
            &mut *tx,
            &deposit.user_id,
            Tokens::whole(deposit.token_amount),
            TransactionKind::Deposit,
            &description,
            Some(&deposit.order_id),
        )
        .await?;

        let promo_bonus = apply_promo_bonus(&mut *tx, &deposit).await?;
        let referral =
            pay_referral_bonus(&mut *tx, &deposit, referral_bonus, referral_min_deposit).await?;

        let new_balance = balance::balance(&mut *tx, &deposit.user_id).await?;
        tx.commit().await?;

        let settled = SettledDeposit {
            deposit_id,
            order_id: deposit.order_id,
            user_id: deposit.user_id,
            tokens: deposit.token_amount,
            promo_bonus: promo_bonus.unwrap_or(0),
            promo_code: promo_bonus.and(deposit.promo_code),
            referral,
            balance: new_balance,
        };

        info!(
            deposit_id,
            user_id = %settled.user_id,
            order_id = %settled.order_id,
            tokens = settled.tokens,
            promo_bonus = settled.promo_bonus,
            referral = settled.referral.is_some(),
            approved_by,
            "Deposit settled"
        );

        Ok(SettleOutcome::Settled(settled))
    }

    /// Settle by gateway order id. Used by the payment webhook.
    pub async fn settle_by_order_id(&self, order_id: &str, approved_by: &str) -> Result<SettleOutcome> {
        let deposit = deposit_store::get_deposit_by_order_id(self.database.pool(), order_id).await?;
        self.settle(deposit.id, approved_by).await
    }

    /// Admin approval.
    pub async fn approve(&self, deposit_id: i64, admin: &str) -> Result<SettleOutcome> {
        self.settle(deposit_id, admin).await
    }

    /// Admin rejection. Returns `false` if the deposit was no longer pending.
    pub async fn reject(&self, deposit_id: i64, admin: &str) -> Result<bool> {
        self.conclude(deposit_id, admin).await
    }

    /// Owner cancellation. Returns `false` if the deposit was no longer pending.
    pub async fn cancel(&self, user_id: &str, deposit_id: i64) -> Result<bool> {
        let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
        if deposit.user_id != user_id {
            return Err(LedgerError::Forbidden(format!(
                "deposit {} belongs to another user",
                deposit_id
            )));
        }
        self.conclude(deposit_id, USER_CANCELLED).await
    }

    async fn conclude(&self, deposit_id: i64, by: &str) -> Result<bool> {
        let rejected = deposit_store::transition_from_pending(
            self.database.pool(),
            deposit_id,
            DepositStatus::Rejected,
            Some(by),
        )
        .await?;

        if rejected {
            info!(deposit_id, by, "Deposit rejected");
        } else {
            // Missing ids surface as NotFound rather than a silent false
            deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
            debug!(deposit_id, by, "Deposit already concluded");
        }
        Ok(rejected)
    }

    /// Pending deposits, newest first.
    pub async fn list_pending(&self) -> Result<Vec<Deposit>> {
        Ok(deposit_store::list_pending(self.database.pool()).await?)
    }

    pub async fn get(&self, deposit_id: i64) -> Result<Deposit> {
        Ok(deposit_store::get_deposit(self.database.pool(), deposit_id).await?)
    }

    pub async fn user_deposits(&self, user_id: &str, limit: i64) -> Result<Vec<Deposit>> {
        Ok(deposit_store::list_user_deposits(self.database.pool(), user_id, limit).await?)
    }

    /// Poll the gateway for a deposit on a background task for the full
    /// polling window.
    pub fn spawn_poller(&self, deposit_id: i64) -> JoinHandle<Result<PollOutcome>> {
        self.spawn_poller_for(deposit_id, self.poll_timeout)
    }

    fn spawn_poller_for(&self, deposit_id: i64, window: Duration) -> JoinHandle<Result<PollOutcome>> {
        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = engine.poll(deposit_id, window).await;
            if let Err(e) = &outcome {
                error!(deposit_id, error = %e, "Deposit poller stopped on storage error");
            }
            outcome
        })
    }

    /// Poll until the deposit concludes or `window` elapses.
    ///
    /// Gateway errors are logged and retried on the next tick. Storage
    /// errors end the loop.
    pub async fn poll(&self, deposit_id: i64, window: Duration) -> Result<PollOutcome> {
        let deadline = Instant::now() + window;
        debug!(deposit_id, window = ?window, interval = ?self.poll_interval, "Polling deposit");

        loop {
            sleep(self.poll_interval).await;

            if Instant::now() >= deadline {
                if self.conclude(deposit_id, SYSTEM_TIMEOUT).await? {
                    info!(deposit_id, "Deposit polling timed out");
                    return Ok(PollOutcome::TimedOut);
                }
                return Ok(self.concluded(deposit_id).await?.unwrap_or(PollOutcome::TimedOut));
            }

            let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
            if let Some(outcome) = outcome_for(deposit.status) {
                return Ok(outcome);
            }

            match self.gateway.check_status(&deposit.order_id).await {
                Ok(PaymentStatus::Paid) => {
                    return Ok(match self.settle(deposit_id, SYSTEM_AUTO).await? {
                        SettleOutcome::Settled(settled) => PollOutcome::Settled(settled),
                        SettleOutcome::AlreadySettled(status) => {
                            outcome_for(status).unwrap_or(PollOutcome::AlreadySettled)
                        }
                    });
                }
                Ok(PaymentStatus::Expired) => {
                    if self.conclude(deposit_id, SYSTEM_EXPIRED).await? {
                        return Ok(PollOutcome::Expired);
                    }
                    if let Some(outcome) = self.concluded(deposit_id).await? {
                        return Ok(outcome);
                    }
                }
                Ok(PaymentStatus::Pending) => {
                    debug!(deposit_id, "Payment still pending");
                }
                Err(e) => {
                    warn!(deposit_id, order_id = %deposit.order_id, error = %e, "Payment status check failed");
                }
            }
        }
    }

    async fn concluded(&self, deposit_id: i64) -> Result<Option<PollOutcome>> {
        let deposit = deposit_store::get_deposit(self.database.pool(), deposit_id).await?;
        Ok(outcome_for(deposit.status))
    }

    /// Pick up gateway deposits left pending by a previous run.
    ///
    /// Deposits past both their gateway expiry and the polling window are
    /// rejected; the rest are polled for whatever window remains.
    pub async fn resume_pending(&self) -> Result<ResumedDeposits> {
        let pending =
            deposit_store::list_pending_by_method(self.database.pool(), PaymentMethod::Gateway)
                .await?;

        let now = Utc::now();
        let mut resumed = ResumedDeposits {
            expired: Vec::new(),
            polling: Vec::new(),
        };

        for deposit in pending {
            let remaining = self
                .deadline_for(&deposit)
                .and_then(|deadline| (deadline - now).to_std().ok())
                .filter(|left| !left.is_zero());

            match remaining {
                Some(window) => {
                    debug!(deposit_id = deposit.id, window = ?window, "Resuming deposit poller");
                    let handle = self.spawn_poller_for(deposit.id, window);
                    resumed.polling.push((deposit, handle));
                }
                None => {
                    if self.conclude(deposit.id, SYSTEM_EXPIRED).await? {
                        resumed.expired.push(deposit);
                    }
                }
            }
        }

        info!(
            polling = resumed.polling.len(),
            expired = resumed.expired.len(),
            "Resumed pending deposits"
        );
        Ok(resumed)
    }

    /// When polling for a deposit ends: the earlier of its gateway expiry
    /// and creation plus the polling window. `None` if neither timestamp
    /// can be read.
    fn deadline_for(&self, deposit: &Deposit) -> Option<DateTime<Utc>> {
        let window = chrono::Duration::from_std(self.poll_timeout).ok()?;
        let polled_until = NaiveDateTime::parse_from_str(&deposit.created_at, SQLITE_DATETIME)
            .ok()
            .map(|created| created.and_utc() + window);
        let gateway_expiry = deposit
            .expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));

        match (polled_until, gateway_expiry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

fn outcome_for(status: DepositStatus) -> Option<PollOutcome> {
    match status {
        DepositStatus::Pending => None,
        DepositStatus::Approved => Some(PollOutcome::AlreadySettled),
        DepositStatus::Rejected => Some(PollOutcome::Rejected),
    }
}

/// Credit the promo bonus attached to a deposit. Returns the bonus paid,
/// or `None` if there was none or the promo can no longer be redeemed.
async fn apply_promo_bonus(conn: &mut SqliteConnection, deposit: &Deposit) -> Result<Option<i64>> {
    let Some(promo_id) = deposit.promo_id else {
        return Ok(None);
    };
    if deposit.promo_bonus <= 0 {
        return Ok(None);
    }

    let code = deposit.promo_code.as_deref().unwrap_or_default();
    if !promo_store::claim_use(&mut *conn, promo_id).await? {
        warn!(
            deposit_id = deposit.id,
            promo_code = code,
            "Promo no longer redeemable, settling without bonus"
        );
        return Ok(None);
    }

    let description = format!("Promo {} bonus", code);
    credit_with_entry(
        &mut *conn,
        &deposit.user_id,
        Tokens::whole(deposit.promo_bonus),
        TransactionKind::PromoBonus,
        &description,
        Some(&deposit.order_id),
    )
    .await?;
    promo_store::insert_usage(
        &mut *conn,
        promo_id,
        &deposit.user_id,
        &deposit.order_id,
        deposit.token_amount,
        deposit.promo_bonus,
    )
    .await?;

    Ok(Some(deposit.promo_bonus))
}

/// Pay the depositor's referrer on their first qualifying deposit.
async fn pay_referral_bonus(
    conn: &mut SqliteConnection,
    deposit: &Deposit,
    bonus: i64,
    min_deposit: i64,
) -> Result<Option<ReferralPayout>> {
    if bonus <= 0 || deposit.token_amount < min_deposit {
        return Ok(None);
    }
    let Some(referral) = referral_store::referral_for(&mut *conn, &deposit.user_id).await? else {
        return Ok(None);
    };
    if referral.bonus_claimed {
        return Ok(None);
    }
    if !referral_store::claim_bonus(&mut *conn, &deposit.user_id, bonus).await? {
        debug!(referred_id = %deposit.user_id, "Referral bonus already claimed");
        return Ok(None);
    }

    let description = format!("Referral bonus for {}", deposit.user_id);
    credit_with_entry(
        &mut *conn,
        &referral.referrer_id,
        Tokens::whole(bonus),
        TransactionKind::ReferralBonus,
        &description,
        Some(&deposit.order_id),
    )
    .await?;
    referral_store::add_bonus_earned(&mut *conn, &referral.referrer_id, bonus).await?;

    info!(
        referrer_id = %referral.referrer_id,
        referred_id = %deposit.user_id,
        bonus,
        "Referral bonus paid"
    );

    Ok(Some(ReferralPayout {
        referrer_id: referral.referrer_id,
        bonus,
    }))
}
