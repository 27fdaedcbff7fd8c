//! Database models.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::tokens::Tokens;

/// A bot user, identified by the chat platform's opaque user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// External user id.
    pub user_id: String,
    /// Platform handle, if any.
    pub username: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Spendable balance. Never negative.
    pub token_balance: Tokens,
    /// Number of billed lookups.
    pub total_checks: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Check,
    PromoBonus,
    ReferralBonus,
    AdminAdjust,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Check => "check",
            TransactionKind::PromoBonus => "promo_bonus",
            TransactionKind::ReferralBonus => "referral_bonus",
            TransactionKind::AdminAdjust => "admin_adjust",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub kind: TransactionKind,
    /// Signed amount.
    pub amount: Tokens,
    pub description: String,
    /// Request id or order id this entry belongs to.
    pub reference: Option<String>,
    pub status: TransactionStatus,
    pub created_at: String,
}

/// Fields for a new ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction<'a> {
    pub user_id: &'a str,
    pub kind: TransactionKind,
    pub amount: Tokens,
    pub description: &'a str,
    pub reference: Option<&'a str>,
    pub status: TransactionStatus,
}

/// Deposit lifecycle. `Pending` transitions out at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Approved => "approved",
            DepositStatus::Rejected => "rejected",
        }
    }
}

/// How a deposit is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    Manual,
}

/// A top-up order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Deposit {
    pub id: i64,
    pub user_id: String,
    /// Fiat amount.
    pub amount: i64,
    /// Whole tokens credited on approval.
    pub token_amount: i64,
    pub status: DepositStatus,
    pub payment_method: PaymentMethod,
    /// Payment gateway order id.
    pub order_id: String,
    /// Payable reference (QR payload) returned by the gateway.
    pub pay_ref: Option<String>,
    pub checkout_url: Option<String>,
    /// Gateway expiry, RFC 3339.
    pub expires_at: Option<String>,
    /// Who approved: `SYSTEM_AUTO`, `WEBHOOK`, or an admin id.
    pub approved_by: Option<String>,
    pub promo_id: Option<i64>,
    pub promo_code: Option<String>,
    /// Whole bonus tokens promised by the promo at order time.
    pub promo_bonus: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeposit<'a> {
    pub user_id: &'a str,
    pub amount: i64,
    pub token_amount: i64,
    pub payment_method: PaymentMethod,
    pub order_id: &'a str,
    pub pay_ref: Option<&'a str>,
    pub checkout_url: Option<&'a str>,
    pub expires_at: Option<&'a str>,
    pub promo_id: Option<i64>,
    pub promo_code: Option<&'a str>,
    pub promo_bonus: i64,
}

/// Lookup request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Success,
    Failed,
    Partial,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Success => "success",
            RequestStatus::Failed => "failed",
            RequestStatus::Partial => "partial",
        }
    }
}

/// A priced lookup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LookupRequest {
    pub id: i64,
    /// Public id, e.g. `REQ-7K2M9QXA`.
    pub request_id: String,
    pub user_id: String,
    /// Feature name.
    pub command: String,
    pub query: String,
    /// Provider tag.
    pub api_type: String,
    pub token_cost: Tokens,
    pub status: RequestStatus,
    pub response_summary: Option<String>,
    /// Provider payload as JSON text.
    pub response_data: Option<String>,
    pub api_remaining: Option<String>,
    pub error_message: Option<String>,
    /// Whether the result was served from an earlier request.
    pub from_cache: bool,
    /// The earlier request a cached result came from.
    pub source_request_id: Option<String>,
    pub created_at: String,
}

/// Terminal fields written when a request finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCompletion<'a> {
    pub status: RequestStatus,
    pub response_summary: Option<&'a str>,
    pub response_data: Option<&'a str>,
    pub api_remaining: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub source_request_id: Option<&'a str>,
}

/// A runtime setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// A deposit bonus voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PromoCode {
    pub id: i64,
    /// Upper-cased, unique ignoring case.
    pub code: String,
    pub bonus_percent: i64,
    /// Minimum deposit in whole tokens.
    pub min_deposit: i64,
    /// 0 means unlimited.
    pub max_uses: i64,
    pub current_uses: i64,
    pub expires_at: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl PromoCode {
    /// Whether the use counter has reached the cap.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.current_uses >= self.max_uses
    }
}

/// Fields for a new promo code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromo<'a> {
    pub code: &'a str,
    pub bonus_percent: i64,
    pub min_deposit: i64,
    pub max_uses: i64,
    /// SQLite datetime string.
    pub expires_at: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// One recorded promo redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PromoUsage {
    pub id: i64,
    pub promo_id: i64,
    pub user_id: String,
    pub order_id: String,
    pub deposit_tokens: i64,
    pub bonus_tokens: i64,
    pub created_at: String,
}

/// A user's shareable referral code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReferralCode {
    pub user_id: String,
    pub code: String,
    pub total_referrals: i64,
    /// Whole tokens earned from referral bonuses.
    pub total_bonus_earned: i64,
    pub created_at: String,
}

/// Link from a referred user to their referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: String,
    pub referred_id: String,
    /// One-way flag, never reset.
    pub bonus_claimed: bool,
    pub bonus_amount: i64,
    pub created_at: String,
    pub bonus_claimed_at: Option<String>,
}

/// A referred user as shown to the referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReferredUser {
    pub referred_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bonus_claimed: bool,
    pub created_at: String,
}
