//! Runtime settings with typed accessors.
//!
//! Settings are plain strings keyed by name. [`SettingsProvider`] is the
//! storage seam; [`SqliteSettings`] reads through a short-lived cache and
//! [`Settings`] turns raw strings into typed values, falling back to
//! [`LedgerConfig`] when a key is unset or unparsable.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use database::{setting as setting_store, Database, Tokens};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::LedgerConfig;
use crate::error::Result;

pub const TOKEN_PRICE: &str = "token_price";
pub const MIN_DEPOSIT: &str = "min_deposit";
pub const MAINTENANCE_MODE: &str = "maintenance_mode";
pub const REFERRAL_BONUS: &str = "referral_bonus";
pub const REFERRAL_MIN_DEPOSIT: &str = "referral_min_deposit";
pub const HISTORY_DAYS: &str = "history_days";
pub const GETDATA_COST: &str = "getdata_cost";
pub const CACHE_MAX_AGE_DAYS: &str = "cache_max_age_days";

/// Settings key holding a feature's price.
pub fn cost_key(feature: &str) -> String {
    match feature {
        "ceknik" => "check_cost".to_string(),
        other => format!("{}_cost", other),
    }
}

/// Settings key holding a feature's maintenance flag.
pub fn maintenance_key(feature: &str) -> String {
    format!("mt_{}", feature)
}

/// Key/value storage for runtime settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value. Last write wins.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All stored values, ordered by key.
    async fn all(&self) -> Result<Vec<(String, String)>>;

    /// Delete a value. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// Settings backed by the `settings` table.
///
/// Reads are cached per key for `ttl` (misses included); writes go to the
/// table and update the cache, so changes made through this instance are
/// visible immediately and changes made elsewhere within `ttl`.
pub struct SqliteSettings {
    database: Database,
    ttl: Duration,
    cache: RwLock<HashMap<String, (Option<String>, Instant)>>,
}

impl SqliteSettings {
    pub fn new(database: Database, ttl: Duration) -> Self {
        Self {
            database,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached value.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}

#[async_trait]
impl SettingsProvider for SqliteSettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some((value, loaded_at)) = self.cache.read().await.get(key) {
            if loaded_at.elapsed() < self.ttl {
                return Ok(value.clone());
            }
        }

        let value = setting_store::get_setting(self.database.pool(), key).await?;
        self.cache
            .write()
            .await
            .insert(key.to_string(), (value.clone(), Instant::now()));
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        setting_store::upsert_setting(self.database.pool(), key, value).await?;
        self.cache
            .write()
            .await
            .insert(key.to_string(), (Some(value.to_string()), Instant::now()));
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(String, String)>> {
        let rows = setting_store::list_settings(self.database.pool()).await?;
        Ok(rows.into_iter().map(|s| (s.key, s.value)).collect())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let existed = setting_store::delete_setting(self.database.pool(), key).await?;
        self.cache
            .write()
            .await
            .insert(key.to_string(), (None, Instant::now()));
        Ok(existed)
    }
}

/// In-process settings with no persistence.
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsProvider for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(String, String)>> {
        let mut all: Vec<(String, String)> = self
            .values
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort();
        Ok(all)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.values.write().await.remove(key).is_some())
    }
}

/// Typed view over a [`SettingsProvider`].
#[derive(Clone)]
pub struct Settings {
    provider: Arc<dyn SettingsProvider>,
    defaults: Arc<LedgerConfig>,
}

impl Settings {
    pub fn new(provider: Arc<dyn SettingsProvider>, defaults: Arc<LedgerConfig>) -> Self {
        Self { provider, defaults }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<dyn SettingsProvider> {
        &self.provider
    }

    /// The compiled fallbacks.
    pub fn defaults(&self) -> &LedgerConfig {
        &self.defaults
    }

    async fn parsed<T: FromStr>(&self, key: &str, fallback: T) -> Result<T> {
        match self.provider.get(key).await? {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key, value = %raw, "Ignoring unparsable setting");
                    Ok(fallback)
                }
            },
            None => Ok(fallback),
        }
    }

    /// Current price of a feature.
    pub async fn feature_cost(&self, feature: &str) -> Result<Tokens> {
        self.parsed(&cost_key(feature), self.defaults.cost_of(feature))
            .await
    }

    /// Set a feature's price.
    pub async fn set_feature_cost(&self, feature: &str, cost: Tokens) -> Result<()> {
        self.provider
            .set(&cost_key(feature), &cost.to_string())
            .await
    }

    /// Whether a single feature is switched off.
    pub async fn feature_in_maintenance(&self, feature: &str) -> Result<bool> {
        Ok(self
            .provider
            .get(&maintenance_key(feature))
            .await?
            .is_some_and(|v| v.trim() == "true"))
    }

    /// Switch a feature's maintenance flag.
    pub async fn set_feature_maintenance(&self, feature: &str, on: bool) -> Result<()> {
        self.provider
            .set(&maintenance_key(feature), if on { "true" } else { "false" })
            .await
    }

    /// Whether every lookup is switched off.
    pub async fn global_maintenance(&self) -> Result<bool> {
        Ok(self
            .provider
            .get(MAINTENANCE_MODE)
            .await?
            .is_some_and(|v| v.trim() == "1"))
    }

    /// Switch global maintenance.
    pub async fn set_global_maintenance(&self, on: bool) -> Result<()> {
        self.provider
            .set(MAINTENANCE_MODE, if on { "1" } else { "0" })
            .await
    }

    /// Fiat per token.
    pub async fn token_price(&self) -> Result<i64> {
        let price = self.parsed(TOKEN_PRICE, self.defaults.token_price).await?;
        Ok(if price > 0 { price } else { self.defaults.token_price })
    }

    pub async fn set_token_price(&self, price: i64) -> Result<()> {
        self.provider.set(TOKEN_PRICE, &price.to_string()).await
    }

    /// Smallest deposit in fiat.
    pub async fn min_deposit(&self) -> Result<i64> {
        self.parsed(MIN_DEPOSIT, self.defaults.min_deposit).await
    }

    pub async fn set_min_deposit(&self, amount: i64) -> Result<()> {
        self.provider.set(MIN_DEPOSIT, &amount.to_string()).await
    }

    /// Smallest top-up in whole tokens: `ceil(min_deposit / token_price)`,
    /// never below the configured minimum.
    pub async fn min_topup_tokens(&self) -> Result<i64> {
        let min_deposit = self.min_deposit().await?;
        let price = self.token_price().await?;
        let from_deposit = (min_deposit + price - 1) / price;
        Ok(from_deposit.max(self.defaults.min_topup_tokens))
    }

    pub async fn referral_bonus(&self) -> Result<i64> {
        self.parsed(REFERRAL_BONUS, self.defaults.referral_bonus)
            .await
    }

    pub async fn referral_min_deposit(&self) -> Result<i64> {
        self.parsed(REFERRAL_MIN_DEPOSIT, self.defaults.referral_min_deposit)
            .await
    }

    pub async fn history_days(&self) -> Result<i64> {
        self.parsed(HISTORY_DAYS, self.defaults.history_days).await
    }

    pub async fn getdata_cost(&self) -> Result<Tokens> {
        self.parsed(GETDATA_COST, self.defaults.getdata_cost).await
    }

    pub async fn cache_max_age_days(&self) -> Result<i64> {
        self.parsed(CACHE_MAX_AGE_DAYS, self.defaults.cache_max_age_days)
            .await
    }
}
