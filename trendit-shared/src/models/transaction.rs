//! Wallet ledger entries
//!
//! The `transactions` table is append-only: rows are inserted by [`crate::wallet`] and
//! never updated (apart from `balance_after`, written in the same database transaction
//! as the insert) or deleted. `(reference, transaction_type)` is unique, which is what
//! makes replayed credits and debits no-ops.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE transaction_type AS ENUM ('credit', 'debit');
//!
//! CREATE TABLE transactions (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     reference VARCHAR(64) NOT NULL,
//!     transaction_type transaction_type NOT NULL,
//!     amount BIGINT NOT NULL CHECK (amount > 0),
//!     balance_after BIGINT,
//!     description TEXT NOT NULL DEFAULT '',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (reference, transaction_type)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

/// One wallet ledger row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reference: String,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_after: Option<i64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Lists a user's entries, newest first, optionally filtered by type
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        transaction_type: Option<TransactionType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, reference, transaction_type, amount, balance_after,
                   description, created_at
            FROM transactions
            WHERE user_id = $1 AND ($2::transaction_type IS NULL OR transaction_type = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(transaction_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_user(
        pool: &PgPool,
        user_id: Uuid,
        transaction_type: Option<TransactionType>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1 AND ($2::transaction_type IS NULL OR transaction_type = $2)
            "#,
        )
        .bind(user_id)
        .bind(transaction_type)
        .fetch_one(pool)
        .await
    }

    /// Lists every entry on the platform (admin)
    pub async fn list_all(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, reference, transaction_type, amount, balance_after,
                   description, created_at
            FROM transactions
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
            .fetch_one(pool)
            .await
    }

    /// Finds the entry recorded for a reference and direction, if any
    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
        transaction_type: TransactionType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, reference, transaction_type, amount, balance_after,
                   description, created_at
            FROM transactions
            WHERE reference = $1 AND transaction_type = $2
            "#,
        )
        .bind(reference)
        .bind(transaction_type)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parse() {
        assert_eq!("credit".parse::<TransactionType>().unwrap(), TransactionType::Credit);
        assert_eq!("debit".parse::<TransactionType>().unwrap(), TransactionType::Debit);
        assert!("refund".parse::<TransactionType>().is_err());
        assert_eq!(TransactionType::Debit.as_str(), "debit");
    }
}
