//! SQLite persistence layer for the token ledger.
//!
//! This crate provides async database operations for users, balances, the
//! transaction log, deposits, lookup requests, settings, promo codes and
//! referrals using SQLx with SQLite.
//!
//! Token quantities are stored as [`Tokens`], an integer count of hundredths.
//! Balance and status changes that must be race-safe are single guarded
//! `UPDATE` statements that report whether they applied; see [`balance`],
//! [`deposit::transition_from_pending`] and [`promo::claim_use`].
//!
//! # Example
//!
//! ```no_run
//! use database::{balance, user, Database, Tokens};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:ledger.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // First interaction creates the user
//!     let user = user::get_or_create_user(db.pool(), "7012345678", Some("budi"), None).await?;
//!     assert_eq!(user.token_balance, Tokens::ZERO);
//!
//!     balance::credit(db.pool(), &user.user_id, Tokens::whole(10)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod balance;
pub mod deposit;
pub mod error;
pub mod models;
pub mod promo;
pub mod referral;
pub mod request;
pub mod setting;
pub mod stats;
pub mod tokens;
pub mod transaction;
pub mod user;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    Deposit, DepositStatus, LookupRequest, NewDeposit, NewPromo, NewTransaction, PaymentMethod,
    PromoCode, PromoUsage, Referral, ReferralCode, ReferredUser, RequestCompletion,
    RequestStatus, Setting, Transaction, TransactionKind, TransactionStatus, User,
};
pub use tokens::{ParseTokensError, Tokens};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle concurrent lookups and deposit pollers.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/ledger.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("ledger.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        db.close().await;
    }

    async fn funded_user(db: &Database, user_id: &str, whole: i64) -> User {
        user::get_or_create_user(db.pool(), user_id, Some("tester"), None)
            .await
            .unwrap();
        balance::credit(db.pool(), user_id, Tokens::whole(whole))
            .await
            .unwrap();
        user::get_user(db.pool(), user_id).await.unwrap()
    }

    fn new_deposit<'a>(user_id: &'a str, order_id: &'a str, tokens: i64) -> NewDeposit<'a> {
        NewDeposit {
            user_id,
            amount: tokens * 5000,
            token_amount: tokens,
            payment_method: PaymentMethod::Gateway,
            order_id,
            pay_ref: Some("000201010212"),
            checkout_url: None,
            expires_at: None,
            promo_id: None,
            promo_code: None,
            promo_bonus: 0,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_user() {
        let db = test_db().await;

        let created = user::get_or_create_user(db.pool(), "1001", Some("alice"), Some("Alice"))
            .await
            .unwrap();
        assert_eq!(created.token_balance, Tokens::ZERO);
        assert_eq!(created.total_checks, 0);

        // Same names: row untouched
        let again = user::get_or_create_user(db.pool(), "1001", Some("alice"), Some("Alice"))
            .await
            .unwrap();
        assert_eq!(again.username.as_deref(), Some("alice"));

        // New handle is picked up, missing display name keeps the old one
        let renamed = user::get_or_create_user(db.pool(), "1001", Some("alice2"), None)
            .await
            .unwrap();
        assert_eq!(renamed.username.as_deref(), Some("alice2"));
        assert_eq!(renamed.display_name.as_deref(), Some("Alice"));

        assert_eq!(user::count_users(db.pool()).await.unwrap(), 1);
        assert_eq!(user::count_users_created_today(db.pool()).await.unwrap(), 1);

        let missing = user::get_user(db.pool(), "nobody").await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_guarded_debit() {
        let db = test_db().await;
        funded_user(&db, "1001", 5).await;

        assert!(balance::debit(db.pool(), "1001", Tokens::whole(3)).await.unwrap());
        // Only 2 left: the guard refuses
        assert!(!balance::debit(db.pool(), "1001", Tokens::whole(3)).await.unwrap());

        let u = user::get_user(db.pool(), "1001").await.unwrap();
        assert_eq!(u.token_balance, Tokens::whole(2));
        assert_eq!(u.total_checks, 1);
    }

    #[tokio::test]
    async fn test_refund_restores_debit() {
        let db = test_db().await;
        funded_user(&db, "1001", 10).await;

        balance::debit(db.pool(), "1001", Tokens::whole(3)).await.unwrap();
        balance::refund(db.pool(), "1001", Tokens::whole(3), true)
            .await
            .unwrap();

        let u = user::get_user(db.pool(), "1001").await.unwrap();
        assert_eq!(u.token_balance, Tokens::whole(10));
        assert_eq!(u.total_checks, 0);

        // Partial refund keeps the check counted
        balance::debit(db.pool(), "1001", Tokens::whole(3)).await.unwrap();
        balance::refund(db.pool(), "1001", Tokens::whole(1), false)
            .await
            .unwrap();
        let u = user::get_user(db.pool(), "1001").await.unwrap();
        assert_eq!(u.token_balance, Tokens::whole(8));
        assert_eq!(u.total_checks, 1);
    }

    #[tokio::test]
    async fn test_fractional_balance() {
        let db = test_db().await;
        funded_user(&db, "1001", 1).await;

        let half: Tokens = "0.5".parse().unwrap();
        assert!(balance::deduct(db.pool(), "1001", half).await.unwrap());
        assert_eq!(balance::balance(db.pool(), "1001").await.unwrap(), half);
    }

    #[tokio::test]
    async fn test_transaction_log() {
        let db = test_db().await;
        funded_user(&db, "1001", 10).await;

        for (kind, amount) in [
            (TransactionKind::Deposit, 10),
            (TransactionKind::Check, 3),
            (TransactionKind::PromoBonus, 5),
        ] {
            transaction::insert_transaction(
                db.pool(),
                &NewTransaction {
                    user_id: "1001",
                    kind,
                    amount: Tokens::whole(amount),
                    description: "test",
                    reference: Some("REF-1"),
                    status: TransactionStatus::Success,
                },
            )
            .await
            .unwrap();
        }

        let recent = transaction::list_user_transactions(db.pool(), "1001", 2)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, TransactionKind::PromoBonus);

        let by_ref = transaction::list_by_reference(db.pool(), "REF-1").await.unwrap();
        assert_eq!(by_ref.len(), 3);
        assert_eq!(by_ref[0].kind, TransactionKind::Deposit);

        let checks = transaction::count_by_kind(db.pool(), "1001", TransactionKind::Check)
            .await
            .unwrap();
        assert_eq!(checks, 1);
    }

    #[tokio::test]
    async fn test_deposit_transition_is_one_way() {
        let db = test_db().await;
        funded_user(&db, "1001", 0).await;

        let id = deposit::insert_deposit(db.pool(), &new_deposit("1001", "TELE-1", 10))
            .await
            .unwrap();

        assert!(
            deposit::transition_from_pending(db.pool(), id, DepositStatus::Approved, Some("admin"))
                .await
                .unwrap()
        );
        assert!(
            !deposit::transition_from_pending(db.pool(), id, DepositStatus::Rejected, None)
                .await
                .unwrap()
        );

        let d = deposit::get_deposit(db.pool(), id).await.unwrap();
        assert_eq!(d.status, DepositStatus::Approved);
        assert_eq!(d.approved_by.as_deref(), Some("admin"));
        assert!(deposit::list_pending(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_order_id() {
        let db = test_db().await;
        funded_user(&db, "1001", 0).await;

        deposit::insert_deposit(db.pool(), &new_deposit("1001", "TELE-1", 10))
            .await
            .unwrap();
        let dup = deposit::insert_deposit(db.pool(), &new_deposit("1001", "TELE-1", 10)).await;
        assert!(matches!(dup, Err(DatabaseError::AlreadyExists { .. })));

        let found = deposit::get_deposit_by_order_id(db.pool(), "TELE-1")
            .await
            .unwrap();
        assert_eq!(found.token_amount, 10);
    }

    async fn successful_request(db: &Database, request_id: &str, query: &str) {
        request::insert_request(
            db.pool(),
            request_id,
            "1001",
            "ceknik",
            query,
            "nik",
            Tokens::whole(3),
        )
        .await
        .unwrap();
        request::complete_request(
            db.pool(),
            request_id,
            &RequestCompletion {
                status: RequestStatus::Success,
                response_summary: Some("found"),
                response_data: Some(r#"{"nama":"BUDI"}"#),
                api_remaining: None,
                error_message: None,
                source_request_id: None,
            },
        )
        .await
        .unwrap();
    }

    async fn backdate(db: &Database, request_id: &str, days: i64) {
        sqlx::query("UPDATE requests SET created_at = datetime('now', ?) WHERE request_id = ?")
            .bind(format!("-{} days", days))
            .bind(request_id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cache_freshness_window() {
        let db = test_db().await;
        funded_user(&db, "1001", 0).await;

        successful_request(&db, "REQ-OLD", "3201012345678901").await;
        backdate(&db, "REQ-OLD", 31).await;
        let hit = request::find_cached(db.pool(), "ceknik", "3201012345678901", 30)
            .await
            .unwrap();
        assert!(hit.is_none());

        successful_request(&db, "REQ-RECENT", "3201012345678901").await;
        backdate(&db, "REQ-RECENT", 29).await;
        let hit = request::find_cached(db.pool(), "ceknik", "3201012345678901", 30)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.request_id, "REQ-RECENT");

        // Other features and queries never match
        assert!(request::find_cached(db.pool(), "nama", "3201012345678901", 30)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_complete_request_only_once() {
        let db = test_db().await;
        funded_user(&db, "1001", 0).await;

        successful_request(&db, "REQ-1", "q").await;
        let again = request::complete_request(
            db.pool(),
            "REQ-1",
            &RequestCompletion {
                status: RequestStatus::Failed,
                response_summary: None,
                response_data: None,
                api_remaining: None,
                error_message: Some("late"),
                source_request_id: None,
            },
        )
        .await
        .unwrap();
        assert!(!again);

        let r = request::get_request(db.pool(), "REQ-1").await.unwrap();
        assert_eq!(r.status, RequestStatus::Success);
        assert!(!r.from_cache);
        assert_eq!(request::count_user_requests_today(db.pool(), "1001").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settings_crud() {
        let db = test_db().await;

        setting::upsert_setting(db.pool(), "token_price", "5000").await.unwrap();
        setting::upsert_setting(db.pool(), "token_price", "4000").await.unwrap();
        assert_eq!(
            setting::get_setting(db.pool(), "token_price").await.unwrap().as_deref(),
            Some("4000")
        );

        assert_eq!(setting::list_settings(db.pool()).await.unwrap().len(), 1);
        assert!(setting::delete_setting(db.pool(), "token_price").await.unwrap());
        assert!(setting::get_setting(db.pool(), "token_price").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promo_claim_respects_cap() {
        let db = test_db().await;

        let promo = promo::create_promo(
            db.pool(),
            &NewPromo {
                code: "bonus100",
                bonus_percent: 100,
                min_deposit: 10,
                max_uses: 2,
                expires_at: None,
                created_by: Some("owner"),
            },
        )
        .await
        .unwrap();
        assert_eq!(promo.code, "BONUS100");

        let dup = promo::create_promo(
            db.pool(),
            &NewPromo {
                code: "Bonus100",
                bonus_percent: 50,
                min_deposit: 0,
                max_uses: 0,
                expires_at: None,
                created_by: None,
            },
        )
        .await;
        assert!(matches!(dup, Err(DatabaseError::AlreadyExists { .. })));

        assert!(promo::claim_use(db.pool(), promo.id).await.unwrap());
        assert!(promo::claim_use(db.pool(), promo.id).await.unwrap());
        assert!(!promo::claim_use(db.pool(), promo.id).await.unwrap());

        let found = promo::find_by_code(db.pool(), "bonus100").await.unwrap().unwrap();
        assert_eq!(found.current_uses, 2);
        assert!(found.is_exhausted());
        assert!(promo::list_redeemable(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promo_expiry_and_active_flag() {
        let db = test_db().await;

        let promo = promo::create_promo(
            db.pool(),
            &NewPromo {
                code: "OLD",
                bonus_percent: 10,
                min_deposit: 0,
                max_uses: 0,
                expires_at: Some("2000-01-01 00:00:00"),
                created_by: None,
            },
        )
        .await
        .unwrap();
        assert!(promo::is_expired(db.pool(), promo.id).await.unwrap());
        assert!(!promo::claim_use(db.pool(), promo.id).await.unwrap());

        let live = promo::create_promo(
            db.pool(),
            &NewPromo {
                code: "LIVE",
                bonus_percent: 10,
                min_deposit: 0,
                max_uses: 0,
                expires_at: None,
                created_by: None,
            },
        )
        .await
        .unwrap();
        assert!(promo::set_active(db.pool(), "live", false).await.unwrap());
        assert!(!promo::claim_use(db.pool(), live.id).await.unwrap());
        assert!(promo::delete_promo(db.pool(), "LIVE").await.unwrap());
        assert_eq!(promo::list_promos(db.pool()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_referral_first_wins() {
        let db = test_db().await;
        for id in ["1001", "1002", "1003"] {
            funded_user(&db, id, 0).await;
        }

        referral::insert_code(db.pool(), "1001", "ABCDEF1001").await.unwrap();
        referral::insert_code(db.pool(), "1003", "GHJKLM1003").await.unwrap();

        let owner = referral::find_by_code(db.pool(), "abcdef1001").await.unwrap().unwrap();
        assert_eq!(owner.user_id, "1001");

        referral::create_referral(db.pool(), "1001", "1002").await.unwrap();
        let second = referral::create_referral(db.pool(), "1003", "1002").await;
        assert!(matches!(second, Err(DatabaseError::AlreadyExists { .. })));

        let code = referral::code_for_user(db.pool(), "1001").await.unwrap().unwrap();
        assert_eq!(code.total_referrals, 1);
        assert_eq!(referral::count_pending_bonuses(db.pool(), "1001").await.unwrap(), 1);

        assert!(referral::claim_bonus(db.pool(), "1002", 20).await.unwrap());
        assert!(!referral::claim_bonus(db.pool(), "1002", 20).await.unwrap());

        let listed = referral::list_referred_users(db.pool(), "1001", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].bonus_claimed);
    }

    #[tokio::test]
    async fn test_overall_stats() {
        let db = test_db().await;
        funded_user(&db, "1001", 0).await;

        let approved = deposit::insert_deposit(db.pool(), &new_deposit("1001", "TELE-A", 10))
            .await
            .unwrap();
        deposit::insert_deposit(db.pool(), &new_deposit("1001", "TELE-B", 4))
            .await
            .unwrap();
        deposit::transition_from_pending(db.pool(), approved, DepositStatus::Approved, None)
            .await
            .unwrap();
        successful_request(&db, "REQ-1", "q").await;

        let stats = stats::overall(db.pool()).await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.approved_deposits, 1);
        assert_eq!(stats.pending_deposits, 1);
        assert_eq!(stats.total_deposit_amount, 50_000);
        assert_eq!(stats.total_tokens_sold, 10);

        let api = stats::api_usage(db.pool()).await.unwrap();
        assert_eq!(api.total.len(), 1);
        assert_eq!(api.total[0].command, "ceknik");
        assert_eq!(api.today[0].tokens, Tokens::whole(3));
    }
}
