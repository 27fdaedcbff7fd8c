//! Referral codes and registration.
//!
//! The payout itself happens during deposit settlement.

use database::{referral as referral_store, user, Database, DatabaseError, ReferralCode, ReferredUser};
use tracing::{info, warn};

use crate::error::{LedgerError, Result};
use crate::ids;

const CODE_ATTEMPTS: usize = 5;

/// A referrer's dashboard numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralStats {
    pub code: String,
    pub total_referred: i64,
    /// Referred users who have not yet triggered a payout.
    pub pending_bonus: i64,
    /// Whole tokens earned so far.
    pub total_earned: i64,
}

#[derive(Debug, Clone)]
pub struct ReferralService {
    database: Database,
}

impl ReferralService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// The user's referral code, generated on first use.
    pub async fn code_for(&self, user_id: &str) -> Result<ReferralCode> {
        if let Some(code) = referral_store::code_for_user(self.database.pool(), user_id).await? {
            return Ok(code);
        }

        for _ in 0..CODE_ATTEMPTS {
            let candidate = ids::referral_code(user_id);
            match referral_store::insert_code(self.database.pool(), user_id, &candidate).await {
                Ok(code) => {
                    info!(user_id, code = %code.code, "Referral code created");
                    return Ok(code);
                }
                Err(DatabaseError::AlreadyExists { .. }) => {
                    // Either the random part collided or another call won the race
                    if let Some(code) =
                        referral_store::code_for_user(self.database.pool(), user_id).await?
                    {
                        return Ok(code);
                    }
                    warn!(user_id, candidate, "Referral code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::InvalidReferral(format!(
            "could not allocate a code for {}",
            user_id
        )))
    }

    /// Link `referred_id` to the owner of `code`.
    ///
    /// A user has at most one referrer; the first registration wins.
    pub async fn register(&self, referred_id: &str, code: &str) -> Result<String> {
        let owner = referral_store::find_by_code(self.database.pool(), &code.trim().to_uppercase())
            .await?
            .ok_or_else(|| LedgerError::InvalidReferral(format!("unknown code {}", code)))?;

        if owner.user_id == referred_id {
            return Err(LedgerError::InvalidReferral(
                "cannot use your own code".to_string(),
            ));
        }

        user::get_user(self.database.pool(), referred_id).await?;

        if referral_store::referral_for(self.database.pool(), referred_id)
            .await?
            .is_some()
        {
            return Err(LedgerError::AlreadyReferred);
        }

        match referral_store::create_referral(self.database.pool(), &owner.user_id, referred_id)
            .await
        {
            Ok(_) => {
                info!(referrer_id = %owner.user_id, referred_id, "Referral registered");
                Ok(owner.user_id)
            }
            Err(DatabaseError::AlreadyExists { .. }) => Err(LedgerError::AlreadyReferred),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn stats(&self, user_id: &str) -> Result<ReferralStats> {
        let code = self.code_for(user_id).await?;
        let pending_bonus =
            referral_store::count_pending_bonuses(self.database.pool(), user_id).await?;
        Ok(ReferralStats {
            code: code.code,
            total_referred: code.total_referrals,
            pending_bonus,
            total_earned: code.total_bonus_earned,
        })
    }

    pub async fn referred_users(&self, user_id: &str, limit: i64) -> Result<Vec<ReferredUser>> {
        Ok(referral_store::list_referred_users(self.database.pool(), user_id, limit).await?)
    }
}
