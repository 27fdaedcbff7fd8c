//! Compiled defaults for prices, thresholds and timings.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use database::Tokens;

/// Features and their default prices in whole tokens. `ceknik` follows
/// `CHECK_COST`.
const DEFAULT_FEATURE_COSTS: &[(&str, i64)] = &[
    ("nama", 3),
    ("kk", 3),
    ("foto", 5),
    ("edabu", 3),
    ("bpjstk", 3),
    ("nopol", 3),
    ("regnik", 3),
    ("regsim", 3),
    ("databocor", 3),
];

/// Ledger configuration.
///
/// Everything here is a fallback: values with a settings key (prices,
/// thresholds, windows) are read from the settings table first.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Default price for features without their own entry.
    pub check_cost: Tokens,
    /// Per-feature prices.
    pub feature_costs: HashMap<String, Tokens>,
    /// Fiat per token.
    pub token_price: i64,
    /// Smallest top-up in whole tokens.
    pub min_topup_tokens: i64,
    /// Smallest deposit in fiat.
    pub min_deposit: i64,
    /// Price of re-reading a saved result.
    pub getdata_cost: Tokens,
    /// How long saved results can be re-read.
    pub history_days: i64,
    /// Whole tokens paid to a referrer.
    pub referral_bonus: i64,
    /// Whole tokens a referred user must deposit to trigger the bonus.
    pub referral_min_deposit: i64,
    /// Freshness window for cache fallback.
    pub cache_max_age_days: i64,
    /// Upper bound on a single provider call.
    pub provider_timeout: Duration,
    /// Delay between payment status checks.
    pub poll_interval: Duration,
    /// How long a deposit is polled before it is force-expired.
    pub poll_timeout: Duration,
    /// Order id prefix.
    pub order_id_prefix: String,
    /// Settings cache lifetime.
    pub settings_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let check_cost = Tokens::whole(2);
        let mut feature_costs: HashMap<String, Tokens> = DEFAULT_FEATURE_COSTS
            .iter()
            .map(|(name, cost)| (name.to_string(), Tokens::whole(*cost)))
            .collect();
        feature_costs.insert("ceknik".to_string(), check_cost);

        Self {
            check_cost,
            feature_costs,
            token_price: 5000,
            min_topup_tokens: 10,
            min_deposit: 2000,
            getdata_cost: Tokens::from_units(50),
            history_days: 10,
            referral_bonus: 20,
            referral_min_deposit: 100,
            cache_max_age_days: 30,
            provider_timeout: Duration::from_secs(180),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(600),
            order_id_prefix: "TELE".to_string(),
            settings_ttl: Duration::from_secs(30),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHECK_COST` | Price of `ceknik` and unlisted features | `2` |
    /// | `FEATURE_COSTS` | `name=cost` pairs, comma separated | built-in table |
    /// | `TOKEN_PRICE` | Fiat per token | `5000` |
    /// | `MIN_TOPUP_TOKEN` | Smallest top-up in tokens | `10` |
    /// | `MIN_DEPOSIT` | Smallest deposit in fiat | `2000` |
    /// | `GETDATA_COST` | Price of re-reading a saved result | `0.5` |
    /// | `HISTORY_DAYS` | Saved-result window in days | `10` |
    /// | `REFERRAL_BONUS` | Referrer payout in tokens | `20` |
    /// | `REFERRAL_MIN_DEPOSIT` | Deposit that triggers the payout | `100` |
    /// | `CACHE_MAX_AGE_DAYS` | Cache fallback window in days | `30` |
    /// | `PROVIDER_TIMEOUT_SECS` | Provider call limit | `180` |
    /// | `PAYMENT_POLL_INTERVAL_SECS` | Payment status poll interval | `5` |
    /// | `PAYMENT_POLL_TIMEOUT_SECS` | Payment polling window | `600` |
    /// | `ORDER_ID_PREFIX` | Order id prefix | `TELE` |
    /// | `SETTINGS_TTL_SECS` | Settings cache lifetime | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let check_cost = parse_var("CHECK_COST", defaults.check_cost)?;

        let mut feature_costs = defaults.feature_costs;
        feature_costs.insert("ceknik".to_string(), check_cost);
        if let Ok(raw) = env::var("FEATURE_COSTS") {
            for (name, cost) in parse_cost_table(&raw)? {
                feature_costs.insert(name, cost);
            }
        }

        Ok(Self {
            check_cost,
            feature_costs,
            token_price: parse_var("TOKEN_PRICE", defaults.token_price)?,
            min_topup_tokens: parse_var("MIN_TOPUP_TOKEN", defaults.min_topup_tokens)?,
            min_deposit: parse_var("MIN_DEPOSIT", defaults.min_deposit)?,
            getdata_cost: parse_var("GETDATA_COST", defaults.getdata_cost)?,
            history_days: parse_var("HISTORY_DAYS", defaults.history_days)?,
            referral_bonus: parse_var("REFERRAL_BONUS", defaults.referral_bonus)?,
            referral_min_deposit: parse_var(
                "REFERRAL_MIN_DEPOSIT",
                defaults.referral_min_deposit,
            )?,
            cache_max_age_days: parse_var("CACHE_MAX_AGE_DAYS", defaults.cache_max_age_days)?,
            provider_timeout: parse_secs("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout)?,
            poll_interval: parse_secs("PAYMENT_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            poll_timeout: parse_secs("PAYMENT_POLL_TIMEOUT_SECS", defaults.poll_timeout)?,
            order_id_prefix: env::var("ORDER_ID_PREFIX").unwrap_or(defaults.order_id_prefix),
            settings_ttl: parse_secs("SETTINGS_TTL_SECS", defaults.settings_ttl)?,
        })
    }

    /// Compiled price for a feature.
    pub fn cost_of(&self, feature: &str) -> Tokens {
        self.feature_costs
            .get(feature)
            .copied()
            .unwrap_or(self.check_cost)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_secs(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}

/// Parse `nama=3,foto=5,getdata=0.5`.
fn parse_cost_table(raw: &str) -> Result<Vec<(String, Tokens)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let invalid = || ConfigError::Invalid {
                name: "FEATURE_COSTS",
                value: pair.to_string(),
            };
            let (name, cost) = pair.split_once('=').ok_or_else(invalid)?;
            let cost = cost.trim().parse::<Tokens>().map_err(|_| invalid())?;
            Ok((name.trim().to_lowercase(), cost))
        })
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
