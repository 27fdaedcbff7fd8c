//! Priced lookups: charge up front, call the provider, then settle the
//! request as found, cached, partial or refunded.
//!
//! ```text
//! price → maintenance? → balance? → [insert request + debit]
//!       → provider (with timeout)
//!       → found:   [success + check entry]
//!       → partial: [partial + refund floor(price/2) + check entry for the rest]
//!       → failed:  cache hit?  [success from cache + check entry]
//!                  no hit:     [failed + full refund + failed check entry]
//! ```
//!
//! Bracketed steps each run in one SQLite transaction that starts with a
//! write, so the debit and the request row appear together and every
//! terminal state lands with its refund and ledger entry or not at all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use database::{
    balance, request, Database, DatabaseError, LookupRequest, RequestCompletion, RequestStatus,
    Tokens, TransactionStatus,
};
use provider_core::{LookupError, LookupProvider, LookupResponse};
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::accounting::log_check;
use crate::cache::ResponseCache;
use crate::error::{LedgerError, Result};
use crate::ids;
use crate::settings::Settings;

/// History listings are capped at this many requests.
pub const HISTORY_LIMIT: i64 = 30;

/// Attempts at finding a free request id.
const REQUEST_ID_ATTEMPTS: usize = 3;

/// Why a charged lookup produced nothing billable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The provider call failed.
    ProviderFailure(String),
    /// The provider call hit its time limit.
    ProviderTimeout,
    /// The provider answered with no data.
    EmptyResult(String),
}

impl LookupFailure {
    /// Text stored as the request's error message.
    pub fn message(&self) -> String {
        match self {
            LookupFailure::ProviderFailure(msg) => msg.clone(),
            LookupFailure::ProviderTimeout => "Provider timed out".to_string(),
            LookupFailure::EmptyResult(msg) => format!("No data found: {}", msg),
        }
    }
}

impl From<LookupError> for LookupFailure {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Empty(msg) => LookupFailure::EmptyResult(msg),
            LookupError::Failed { message, .. } => LookupFailure::ProviderFailure(message),
            LookupError::Timeout => LookupFailure::ProviderTimeout,
        }
    }
}

/// What the user got for their tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    /// Live data, fully billed.
    Found {
        payload: Value,
        summary: Option<String>,
    },
    /// The live call failed; an earlier result was served and billed.
    Cached {
        payload: Value,
        summary: Option<String>,
        source_request_id: String,
        cached_at: String,
    },
    /// Live data with a missing part; half the price was refunded.
    Partial {
        payload: Value,
        reason: String,
        refunded: Tokens,
    },
    /// Nothing billable; the full price was refunded.
    Failed {
        reason: LookupFailure,
        refunded: Tokens,
    },
}

/// Terminal outcome of a priced lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub request_id: String,
    pub feature: String,
    pub query: String,
    pub price: Tokens,
    pub result: LookupResult,
    /// Balance after the outcome was applied.
    pub balance: Tokens,
}

impl LookupOutcome {
    /// Tokens the user paid in the end.
    pub fn charged(&self) -> Tokens {
        match &self.result {
            LookupResult::Found { .. } | LookupResult::Cached { .. } => self.price,
            LookupResult::Partial { refunded, .. } | LookupResult::Failed { refunded, .. } => {
                self.price - *refunded
            }
        }
    }

    /// Terminal request status.
    pub fn status(&self) -> RequestStatus {
        match &self.result {
            LookupResult::Found { .. } | LookupResult::Cached { .. } => RequestStatus::Success,
            LookupResult::Partial { .. } => RequestStatus::Partial,
            LookupResult::Failed { .. } => RequestStatus::Failed,
        }
    }
}

/// A saved result read back by its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResult {
    pub request: LookupRequest,
    pub payload: Value,
    pub charged: Tokens,
    pub balance: Tokens,
}

/// Runs priced lookups against registered providers.
#[derive(Clone)]
pub struct RequestLifecycle {
    database: Database,
    settings: Settings,
    cache: ResponseCache,
    providers: HashMap<String, Arc<dyn LookupProvider>>,
    provider_timeout: Duration,
}

impl RequestLifecycle {
    pub fn new(database: Database, settings: Settings) -> Self {
        let provider_timeout = settings.defaults().provider_timeout;
        Self {
            cache: ResponseCache::new(database.clone()),
            database,
            settings,
            providers: HashMap::new(),
            provider_timeout,
        }
    }

    /// Register the provider serving `feature`.
    pub fn with_provider(mut self, feature: &str, provider: Arc<dyn LookupProvider>) -> Self {
        self.providers.insert(feature.to_string(), provider);
        self
    }

    /// Override the per-call provider time limit.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Registered feature names, sorted.
    pub fn features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether a provider is registered for `feature`.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.providers.contains_key(feature)
    }

    /// Run one priced lookup.
    ///
    /// Returns `Err` only when nothing was charged (maintenance, balance,
    /// unknown feature) or when storage failed. Every provider outcome,
    /// including failure, is an `Ok` with its refund already applied.
    pub async fn lookup(&self, user_id: &str, feature: &str, query: &str) -> Result<LookupOutcome> {
        let provider = self
            .providers
            .get(feature)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownFeature(feature.to_string()))?;

        let price = self.settings.feature_cost(feature).await?;

        if self.settings.global_maintenance().await? {
            return Err(LedgerError::MaintenanceActive("all lookups".to_string()));
        }
        if self.settings.feature_in_maintenance(feature).await? {
            return Err(LedgerError::MaintenanceActive(feature.to_string()));
        }

        let available = balance::balance(self.database.pool(), user_id).await?;
        if available < price {
            return Err(LedgerError::InsufficientBalance {
                required: price,
                available,
            });
        }

        let request_id = self
            .open_request(user_id, feature, query, provider.name(), price)
            .await?;
        info!(%request_id, user_id, feature, %price, "Lookup charged");

        let outcome = match tokio::time::timeout(self.provider_timeout, provider.lookup(query)).await
        {
            Ok(Ok(response)) if response.is_empty() => {
                Err(LookupFailure::EmptyResult("provider returned no records".to_string()))
            }
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(LookupFailure::from(e)),
            Err(_) => Err(LookupFailure::ProviderTimeout),
        };

        let result = match outcome {
            Ok(response) => match response.partial.clone() {
                Some(reason) => {
                    self.finish_partial(user_id, &request_id, price, response, reason)
                        .await?
                }
                None => self.finish_found(user_id, &request_id, price, response).await?,
            },
            Err(failure) => {
                warn!(%request_id, feature, "Lookup failed: {}", failure.message());
                self.finish_failed(user_id, &request_id, feature, query, price, failure)
                    .await?
            }
        };

        let balance = balance::balance(self.database.pool(), user_id).await?;
        Ok(LookupOutcome {
            request_id,
            feature: feature.to_string(),
            query: query.to_string(),
            price,
            result,
            balance,
        })
    }

    /// Insert the pending request and take the price in one transaction.
    async fn open_request(
        &self,
        user_id: &str,
        feature: &str,
        query: &str,
        api_type: &str,
        price: Tokens,
    ) -> Result<String> {
        for _ in 0..REQUEST_ID_ATTEMPTS {
            let request_id = ids::request_id();
            let mut tx = self.database.pool().begin().await?;

            match request::insert_request(&mut *tx, &request_id, user_id, feature, query, api_type, price)
                .await
            {
                Ok(()) => {}
                Err(DatabaseError::AlreadyExists { .. }) => {
                    debug!(%request_id, "Request id taken, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if !balance::debit(&mut *tx, user_id, price).await? {
                tx.rollback().await?;
                let available = balance::balance(self.database.pool(), user_id).await?;
                return Err(LedgerError::InsufficientBalance {
                    required: price,
                    available,
                });
            }

            tx.commit().await?;
            return Ok(request_id);
        }

        Err(LedgerError::Storage(DatabaseError::AlreadyExists {
            entity: "Request",
            id: "generated request id".to_string(),
        }))
    }

    async fn finish_found(
        &self,
        user_id: &str,
        request_id: &str,
        price: Tokens,
        response: LookupResponse,
    ) -> Result<LookupResult> {
        let data = response.payload.to_string();
        let summary = response.summary.as_deref().unwrap_or("Data found");

        let mut tx = self.database.pool().begin().await?;
        complete(
            &mut *tx,
            request_id,
            &RequestCompletion {
                status: RequestStatus::Success,
                response_summary: Some(summary),
                response_data: Some(&data),
                api_remaining: response.api_remaining.as_deref(),
                error_message: None,
                source_request_id: None,
            },
        )
        .await?;
        log_check(
            &mut *tx,
            user_id,
            price,
            "Lookup succeeded",
            request_id,
            TransactionStatus::Success,
        )
        .await?;
        tx.commit().await?;

        info!(request_id, "Lookup succeeded");
        Ok(LookupResult::Found {
            payload: response.payload,
            summary: response.summary,
        })
    }

    async fn finish_partial(
        &self,
        user_id: &str,
        request_id: &str,
        price: Tokens,
        response: LookupResponse,
        reason: String,
    ) -> Result<LookupResult> {
        let data = response.payload.to_string();
        let refunded = price.half_floor();
        let billed = price - refunded;

        let mut tx = self.database.pool().begin().await?;
        complete(
            &mut *tx,
            request_id,
            &RequestCompletion {
                status: RequestStatus::Partial,
                response_summary: Some(&reason),
                response_data: Some(&data),
                api_remaining: response.api_remaining.as_deref(),
                error_message: None,
                source_request_id: None,
            },
        )
        .await?;
        if refunded.is_positive() {
            // The check still counts: the user received data.
            balance::refund(&mut *tx, user_id, refunded, false).await?;
        }
        log_check(
            &mut *tx,
            user_id,
            billed,
            &format!("Lookup partial: {}", reason),
            request_id,
            TransactionStatus::Success,
        )
        .await?;
        tx.commit().await?;

        info!(request_id, %refunded, "Lookup partial");
        Ok(LookupResult::Partial {
            payload: response.payload,
            reason,
            refunded,
        })
    }

    async fn finish_failed(
        &self,
        user_id: &str,
        request_id: &str,
        feature: &str,
        query: &str,
        price: Tokens,
        failure: LookupFailure,
    ) -> Result<LookupResult> {
        let max_age = self.settings.cache_max_age_days().await?;

        let message = failure.message();

        if let Some(cached) = self.cache.lookup(feature, query, max_age).await? {
            let mut tx = self.database.pool().begin().await?;
            complete(
                &mut *tx,
                request_id,
                &RequestCompletion {
                    status: RequestStatus::Success,
                    response_summary: cached.summary.as_deref(),
                    response_data: None,
                    api_remaining: None,
                    error_message: Some(&message),
                    source_request_id: Some(&cached.request_id),
                },
            )
            .await?;
            log_check(
                &mut *tx,
                user_id,
                price,
                "Lookup served from cache",
                request_id,
                TransactionStatus::Success,
            )
            .await?;
            tx.commit().await?;

            info!(request_id, source = %cached.request_id, "Lookup served from cache");
            return Ok(LookupResult::Cached {
                payload: cached.payload,
                summary: cached.summary,
                source_request_id: cached.request_id,
                cached_at: cached.created_at,
            });
        }

        let mut tx = self.database.pool().begin().await?;
        complete(
            &mut *tx,
            request_id,
            &RequestCompletion {
                status: RequestStatus::Failed,
                response_summary: None,
                response_data: None,
                api_remaining: None,
                error_message: Some(&message),
                source_request_id: None,
            },
        )
        .await?;
        balance::refund(&mut *tx, user_id, price, true).await?;
        log_check(
            &mut *tx,
            user_id,
            price,
            "Lookup failed, refunded",
            request_id,
            TransactionStatus::Failed,
        )
        .await?;
        tx.commit().await?;

        info!(request_id, %price, "Lookup refunded");
        Ok(LookupResult::Failed {
            reason: failure,
            refunded: price,
        })
    }

    /// Re-read a saved result for a fee.
    ///
    /// The request must belong to `user_id`, be inside the history window
    /// and have data (its own, or its cache source's). Nothing is charged
    /// when any of that fails.
    pub async fn fetch_saved(&self, user_id: &str, request_id: &str) -> Result<SavedResult> {
        let not_found = || LedgerError::NotFound {
            entity: "Request",
            id: request_id.to_string(),
        };

        let saved = request::get_request(self.database.pool(), request_id).await?;
        if saved.user_id != user_id {
            return Err(not_found());
        }

        let history_days = self.settings.history_days().await?;
        if request::age_in_days(self.database.pool(), request_id).await? >= history_days {
            return Err(not_found());
        }

        let data = match (&saved.status, &saved.response_data, &saved.source_request_id) {
            (RequestStatus::Success | RequestStatus::Partial, Some(data), _) => data.clone(),
            (RequestStatus::Success, None, Some(source)) => {
                request::get_request(self.database.pool(), source)
                    .await?
                    .response_data
                    .ok_or_else(not_found)?
            }
            _ => return Err(not_found()),
        };
        let payload: Value = serde_json::from_str(&data).map_err(|e| {
            error!(request_id, "Stored payload is not valid JSON: {}", e);
            not_found()
        })?;

        let cost = self.settings.getdata_cost().await?;
        if cost.is_positive() {
            let mut tx = self.database.pool().begin().await?;
            if !balance::deduct(&mut *tx, user_id, cost).await? {
                tx.rollback().await?;
                let available = balance::balance(self.database.pool(), user_id).await?;
                return Err(LedgerError::InsufficientBalance {
                    required: cost,
                    available,
                });
            }
            log_check(
                &mut *tx,
                user_id,
                cost,
                "Saved result retrieved",
                request_id,
                TransactionStatus::Success,
            )
            .await?;
            tx.commit().await?;
        }

        let balance = balance::balance(self.database.pool(), user_id).await?;
        Ok(SavedResult {
            request: saved,
            payload,
            charged: cost,
            balance,
        })
    }

    /// A user's requests inside the history window, newest first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<LookupRequest>> {
        let days = self.settings.history_days().await?;
        Ok(
            request::list_user_requests_within_days(self.database.pool(), user_id, days, HISTORY_LIMIT)
                .await?,
        )
    }
}

/// Write a terminal status, failing loudly if the request already ended.
async fn complete(
    conn: &mut SqliteConnection,
    request_id: &str,
    completion: &RequestCompletion<'_>,
) -> Result<()> {
    if request::complete_request(&mut *conn, request_id, completion).await? {
        Ok(())
    } else {
        error!(request_id, "Request was no longer pending");
        Err(LedgerError::Storage(DatabaseError::NotFound {
            entity: "pending request",
            id: request_id.to_string(),
        }))
    }
}
