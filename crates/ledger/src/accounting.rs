//! Token accounting: balance mutations paired with their ledger entries.
//!
//! The crate-internal helpers take a connection so that callers can group
//! a balance change, its transaction row and any status change into one
//! SQLite transaction.

use database::{
    balance, transaction, user, Database, NewTransaction, Tokens, Transaction, TransactionKind,
    TransactionStatus, User,
};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{LedgerError, Result};

/// Credit `amount` and append the matching ledger entry.
pub(crate) async fn credit_with_entry(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Tokens,
    kind: TransactionKind,
    description: &str,
    reference: Option<&str>,
) -> Result<()> {
    balance::credit(&mut *conn, user_id, amount).await?;
    transaction::insert_transaction(
        &mut *conn,
        &NewTransaction {
            user_id,
            kind,
            amount,
            description,
            reference,
            status: TransactionStatus::Success,
        },
    )
    .await?;
    Ok(())
}

/// Append a `check` entry for a lookup.
pub(crate) async fn log_check(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Tokens,
    description: &str,
    reference: &str,
    status: TransactionStatus,
) -> Result<()> {
    transaction::insert_transaction(
        &mut *conn,
        &NewTransaction {
            user_id,
            kind: TransactionKind::Check,
            amount,
            description,
            reference: Some(reference),
            status,
        },
    )
    .await?;
    Ok(())
}

/// Balance queries and administrative adjustments.
#[derive(Debug, Clone)]
pub struct Accounting {
    database: Database,
}

impl Accounting {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Get a user, creating it on first interaction.
    pub async fn ensure_user(
        &self,
        user_id: &str,
        username: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<User> {
        Ok(user::get_or_create_user(self.database.pool(), user_id, username, display_name).await?)
    }

    /// Current balance.
    pub async fn balance(&self, user_id: &str) -> Result<Tokens> {
        Ok(balance::balance(self.database.pool(), user_id).await?)
    }

    /// Recent ledger entries, newest first.
    pub async fn recent_transactions(&self, user_id: &str, limit: i64) -> Result<Vec<Transaction>> {
        Ok(transaction::list_user_transactions(self.database.pool(), user_id, limit).await?)
    }

    /// Grant tokens on behalf of an admin. Returns the new balance.
    pub async fn add_tokens(&self, user_id: &str, amount: Tokens, admin: &str) -> Result<Tokens> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "adjustment must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.database.pool().begin().await?;
        let description = format!("Admin top-up by {}", admin);
        credit_with_entry(
            &mut *tx,
            user_id,
            amount,
            TransactionKind::AdminAdjust,
            &description,
            None,
        )
        .await?;
        let new_balance = balance::balance(&mut *tx, user_id).await?;
        tx.commit().await?;

        info!(user_id, %amount, admin, "Admin added tokens");
        Ok(new_balance)
    }

    /// Remove tokens on behalf of an admin. Returns the new balance.
    ///
    /// Fails with `InsufficientBalance` rather than going negative.
    pub async fn reduce_tokens(&self, user_id: &str, amount: Tokens, admin: &str) -> Result<Tokens> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "adjustment must be positive, got {}",
                amount
            )));
        }

        let mut tx = self.database.pool().begin().await?;
        if !balance::deduct(&mut *tx, user_id, amount).await? {
            let available = balance::balance(&mut *tx, user_id).await?;
            tx.rollback().await?;
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let description = format!("Admin reduction by {}", admin);
        transaction::insert_transaction(
            &mut *tx,
            &NewTransaction {
                user_id,
                kind: TransactionKind::AdminAdjust,
                amount: -amount,
                description: &description,
                reference: None,
                status: TransactionStatus::Success,
            },
        )
        .await?;
        let new_balance = balance::balance(&mut *tx, user_id).await?;
        tx.commit().await?;

        info!(user_id, %amount, admin, "Admin reduced tokens");
        Ok(new_balance)
    }
}
