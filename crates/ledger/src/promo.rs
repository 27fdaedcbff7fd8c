//! Promo code administration and validation.

use database::{promo as promo_store, validation, Database, DatabaseError, NewPromo, PromoCode};
use tracing::info;

use crate::error::{LedgerError, Result};

/// Bonus tokens a promo gives on a deposit: `floor(tokens × percent / 100)`.
pub fn bonus_for(promo: &PromoCode, token_amount: i64) -> i64 {
    token_amount * promo.bonus_percent / 100
}

/// A promo with its redemption count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoInfo {
    pub promo: PromoCode,
    pub usages: usize,
    pub expired: bool,
}

/// Create, inspect and validate promo codes.
#[derive(Debug, Clone)]
pub struct PromoService {
    database: Database,
}

impl PromoService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Create a promo. `expires_in_days` of `None` never expires.
    pub async fn create(
        &self,
        code: &str,
        bonus_percent: i64,
        min_deposit: i64,
        max_uses: i64,
        expires_in_days: Option<i64>,
        created_by: &str,
    ) -> Result<PromoCode> {
        let code = validation::validate_promo_code(code)?;
        validation::validate_bonus_percent(bonus_percent)?;
        if min_deposit < 0 || max_uses < 0 {
            return Err(LedgerError::InvalidAmount(
                "minimum deposit and max uses cannot be negative".to_string(),
            ));
        }

        let expires_at = expires_in_days.map(|days| {
            (chrono::Utc::now() + chrono::Duration::days(days))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        });

        let promo = promo_store::create_promo(
            self.database.pool(),
            &NewPromo {
                code: &code,
                bonus_percent,
                min_deposit,
                max_uses,
                expires_at: expires_at.as_deref(),
                created_by: Some(created_by),
            },
        )
        .await
        .map_err(|e| match e {
            DatabaseError::AlreadyExists { .. } => {
                LedgerError::InvalidPromo(format!("{} already exists", code))
            }
            other => other.into(),
        })?;

        info!(code = %promo.code, bonus_percent, max_uses, "Promo created");
        Ok(promo)
    }

    /// All promos, newest first.
    pub async fn list(&self) -> Result<Vec<PromoCode>> {
        Ok(promo_store::list_promos(self.database.pool()).await?)
    }

    /// Promos that can currently be redeemed.
    pub async fn list_active(&self) -> Result<Vec<PromoCode>> {
        Ok(promo_store::list_redeemable(self.database.pool()).await?)
    }

    /// A promo with its usage count.
    pub async fn info(&self, code: &str) -> Result<PromoInfo> {
        let promo = self.find(code).await?;
        let usages = promo_store::list_usages(self.database.pool(), promo.id)
            .await?
            .len();
        let expired = promo_store::is_expired(self.database.pool(), promo.id).await?;
        Ok(PromoInfo {
            promo,
            usages,
            expired,
        })
    }

    /// Turn a promo on or off.
    pub async fn set_active(&self, code: &str, active: bool) -> Result<()> {
        if !promo_store::set_active(self.database.pool(), code, active).await? {
            return Err(not_found(code));
        }
        info!(code, active, "Promo toggled");
        Ok(())
    }

    /// Delete a promo and its usage records.
    pub async fn delete(&self, code: &str) -> Result<()> {
        if !promo_store::delete_promo(self.database.pool(), code).await? {
            return Err(not_found(code));
        }
        info!(code, "Promo deleted");
        Ok(())
    }

    async fn find(&self, code: &str) -> Result<PromoCode> {
        promo_store::find_by_code(self.database.pool(), code)
            .await?
            .ok_or_else(|| not_found(code))
    }

    /// Check a promo against a deposit of `token_amount` whole tokens.
    pub async fn validate(&self, code: &str, token_amount: i64) -> Result<PromoCode> {
        let promo = promo_store::find_by_code(self.database.pool(), code)
            .await?
            .ok_or_else(|| LedgerError::InvalidPromo(format!("{} does not exist", code)))?;

        if !promo.is_active {
            return Err(LedgerError::InvalidPromo(format!("{} is not active", promo.code)));
        }
        if promo_store::is_expired(self.database.pool(), promo.id).await? {
            return Err(LedgerError::InvalidPromo(format!("{} has expired", promo.code)));
        }
        if promo.is_exhausted() {
            return Err(LedgerError::InvalidPromo(format!("{} is used up", promo.code)));
        }
        if token_amount < promo.min_deposit {
            return Err(LedgerError::InvalidPromo(format!(
                "{} needs a deposit of at least {} tokens",
                promo.code, promo.min_deposit
            )));
        }

        Ok(promo)
    }

    /// The redeemable promo giving the largest bonus on `token_amount`.
    pub async fn best_for(&self, token_amount: i64) -> Result<Option<(PromoCode, i64)>> {
        let best = promo_store::list_redeemable(self.database.pool())
            .await?
            .into_iter()
            .filter(|p| token_amount >= p.min_deposit)
            .map(|p| {
                let bonus = bonus_for(&p, token_amount);
                (p, bonus)
            })
            .filter(|(_, bonus)| *bonus > 0)
            .max_by_key(|(p, bonus)| (*bonus, -p.id));
        Ok(best)
    }
}

fn not_found(code: &str) -> LedgerError {
    LedgerError::NotFound {
        entity: "Promo",
        id: code.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> PromoService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        PromoService::new(db)
    }

    #[tokio::test]
    async fn test_create_and_validate() {
        let promos = service().await;
        promos
            .create("bonus100", 100, 10, 0, None, "owner")
            .await
            .unwrap();

        let promo = promos.validate("BONUS100", 10).await.unwrap();
        assert_eq!(bonus_for(&promo, 10), 10);

        assert!(matches!(
            promos.validate("BONUS100", 9).await,
            Err(LedgerError::InvalidPromo(_))
        ));
        assert!(matches!(
            promos.validate("NOPE", 100).await,
            Err(LedgerError::InvalidPromo(_))
        ));
        assert!(matches!(
            promos.create("BONUS100", 50, 0, 0, None, "owner").await,
            Err(LedgerError::InvalidPromo(_))
        ));
        assert!(matches!(
            promos.create("X1", 50, 0, 0, None, "owner").await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            promos.create("HUGE", 150, 0, 0, None, "owner").await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_and_expired_never_validate() {
        let promos = service().await;
        promos.create("PAUSED", 10, 0, 0, None, "owner").await.unwrap();
        promos.set_active("paused", false).await.unwrap();
        assert!(promos.validate("PAUSED", 100).await.is_err());

        promos.create("GONE", 10, 0, 0, Some(-1), "owner").await.unwrap();
        assert!(promos.validate("GONE", 100).await.is_err());
        assert!(promos.info("GONE").await.unwrap().expired);

        assert!(promos.list_active().await.unwrap().is_empty());
        assert_eq!(promos.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_best_for_picks_largest_bonus() {
        let promos = service().await;
        promos.create("SMALL", 10, 0, 0, None, "owner").await.unwrap();
        promos.create("BIG", 50, 100, 0, None, "owner").await.unwrap();
        promos.create("MID", 25, 0, 0, None, "owner").await.unwrap();

        let (promo, bonus) = promos.best_for(20).await.unwrap().unwrap();
        assert_eq!(promo.code, "MID");
        assert_eq!(bonus, 5);

        let (promo, bonus) = promos.best_for(100).await.unwrap().unwrap();
        assert_eq!(promo.code, "BIG");
        assert_eq!(bonus, 50);

        // 10% of 5 rounds down to nothing
        promos.delete("MID").await.unwrap();
        assert!(promos.best_for(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_promo_admin_ops() {
        let promos = service().await;
        assert!(matches!(
            promos.set_active("NOPE", true).await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            promos.delete("NOPE").await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            promos.info("NOPE").await,
            Err(LedgerError::NotFound { .. })
        ));
    }
}
