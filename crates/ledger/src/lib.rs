//! Token ledger for a pay-per-lookup chat bot.
//!
//! Users hold a token balance. A lookup debits its price up front, calls a
//! [`LookupProvider`](provider_core::LookupProvider) and then either keeps
//! the charge, serves an earlier cached result, refunds half (partial
//! data) or refunds everything. Deposits go through a
//! [`PaymentGateway`](provider_core::PaymentGateway) and are credited
//! exactly once, together with any promo and referral bonus.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use database::Database;
//! use ledger::{LedgerConfig, RequestLifecycle, Settings, SqliteSettings};
//!
//! # async fn example(provider: Arc<dyn provider_core::LookupProvider>) -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:ledger.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let config = Arc::new(LedgerConfig::from_env()?);
//! let settings = Settings::new(
//!     Arc::new(SqliteSettings::new(db.clone(), config.settings_ttl)),
//!     config,
//! );
//!
//! let lifecycle = RequestLifecycle::new(db, settings).with_provider("nama", provider);
//! let outcome = lifecycle.lookup("7012345678", "nama", "BUDI SANTOSO").await?;
//! println!("charged {} tokens", outcome.charged());
//! # Ok(())
//! # }
//! ```

mod accounting;
mod cache;
mod config;
mod error;
pub mod ids;
mod lifecycle;
mod promo;
mod referral;
pub mod settings;
mod settlement;

pub use accounting::Accounting;
pub use cache::{CachedResponse, ResponseCache};
pub use config::{ConfigError, LedgerConfig};
pub use error::{LedgerError, Result};
pub use lifecycle::{
    LookupFailure, LookupOutcome, LookupResult, RequestLifecycle, SavedResult, HISTORY_LIMIT,
};
pub use promo::{bonus_for, PromoInfo, PromoService};
pub use referral::{ReferralService, ReferralStats};
pub use settings::{MemorySettings, Settings, SettingsProvider, SqliteSettings};
pub use settlement::{
    AppliedPromo, DepositEngine, DepositOrder, PollOutcome, ReferralPayout, ResumedDeposits,
    SettleOutcome, SettledDeposit, SYSTEM_AUTO, SYSTEM_EXPIRED, SYSTEM_TIMEOUT, USER_CANCELLED,
    WEBHOOK,
};

pub use database::Tokens;
