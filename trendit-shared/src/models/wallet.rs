//! Wallet model
//!
//! Exactly one wallet per user, created with the user. The balance is in minor units
//! (kobo for NGN) and guarded by `CHECK (balance >= 0)`. Balances are only mutated
//! through [`crate::wallet`]; this module only reads.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE wallets (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
//!     balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
//!     currency_code VARCHAR(3) NOT NULL DEFAULT 'NGN',
//!     currency_name VARCHAR(50) NOT NULL DEFAULT 'Naira',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Minor units
    pub balance: i64,

    pub currency_code: String,
    pub currency_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub async fn find_by_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, currency_code, currency_name, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Sum of all wallet balances (admin dashboard)
    pub async fn total_balance<'e, E: PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(balance), 0)::BIGINT FROM wallets")
            .fetch_one(executor)
            .await
    }
}
