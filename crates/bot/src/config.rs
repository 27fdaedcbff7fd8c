//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

use ledger::LedgerConfig;
use lookup_providers::{CallbackConfig, HttpJsonConfig};

/// A lookup feature served over HTTP.
#[derive(Debug, Clone)]
pub enum FeatureSource {
    /// One GET returning a JSON envelope.
    Http(HttpJsonConfig),
    /// Submit, then poll a callback URL.
    Callback(CallbackConfig),
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// HTTP bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// User ids allowed to run owner commands.
    pub owner_ids: Vec<String>,
    /// Messages per user per minute before replies stop.
    pub max_messages_per_minute: u32,
    /// Retry attempts for transient provider failures.
    pub provider_attempts: u32,
    /// Features and where they are served from.
    pub features: Vec<(String, FeatureSource)>,
    /// Ledger defaults.
    pub ledger: LedgerConfig,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `BOT_ADDR` | HTTP bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:ledger.db?mode=rwc` |
    /// | `OWNER_IDS` | Comma-separated owner user ids | (required) |
    /// | `MAX_MESSAGES_PER_MINUTE` | Per-user rate limit | `30` |
    /// | `PROVIDER_ATTEMPTS` | Attempts per provider call | `2` |
    /// | `LOOKUP_API_KEY` | Key substituted into `{key}` | (empty) |
    /// | `FEATURE_<NAME>_URL` | URL template for a JSON feature | (unset) |
    /// | `FEATURE_<NAME>_CALLBACK_URL` | Submit template for a callback feature | (unset) |
    ///
    /// Only features with a URL configured are registered. Ledger variables
    /// are documented on [`LedgerConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("BOT_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "sqlite:ledger.db?mode=rwc".to_string());

        let owner_ids = parse_owner_ids(&env::var("OWNER_IDS").map_err(|_| ConfigError::MissingOwners)?);
        if owner_ids.is_empty() {
            return Err(ConfigError::MissingOwners);
        }

        let max_messages_per_minute = parse_number("MAX_MESSAGES_PER_MINUTE", 30)?;
        let provider_attempts = parse_number("PROVIDER_ATTEMPTS", 2)?;

        let ledger = LedgerConfig::from_env().map_err(ConfigError::Ledger)?;
        let api_key = env::var("LOOKUP_API_KEY").unwrap_or_default();

        let mut names: Vec<&String> = ledger.feature_costs.keys().collect();
        names.sort();
        let mut features = Vec::new();
        for name in names {
            let var = name.to_ascii_uppercase();
            if let Ok(template) = env::var(format!("FEATURE_{}_URL", var)) {
                let config = HttpJsonConfig::new(name.as_str(), template)
                    .with_api_key(api_key.as_str())
                    .with_timeout(ledger.provider_timeout);
                features.push((name.clone(), FeatureSource::Http(config)));
            } else if let Ok(template) = env::var(format!("FEATURE_{}_CALLBACK_URL", var)) {
                let config =
                    CallbackConfig::new(name.as_str(), template).with_api_key(api_key.as_str());
                features.push((name.clone(), FeatureSource::Callback(config)));
            }
        }

        Ok(Self {
            addr,
            database_url,
            owner_ids,
            max_messages_per_minute,
            provider_attempts,
            features,
            ledger,
        })
    }
}

/// Split a comma-separated id list, dropping blanks.
pub fn parse_owner_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BOT_ADDR format")]
    InvalidAddr,

    #[error("OWNER_IDS environment variable is required")]
    MissingOwners,

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Ledger(ledger::ConfigError),
}
