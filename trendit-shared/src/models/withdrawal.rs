//! Withdrawal model
//!
//! The wallet is debited (ledger reference = withdrawal reference) in the same
//! transaction that inserts the `pending` row; the gateway transfer is requested after
//! commit. [`crate::settlement::settle_withdrawal`] moves it to a final status and
//! refunds on failure.
//!
//! # State Machine
//!
//! ```text
//! pending → completed
//!         → failed    (refunded)
//!         → reversed  (refunded)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "id, user_id, reference, amount, bank_code, bank_name, \
     account_no, account_name, status, failure_reason, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
    Reversed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Reversed => "reversed",
        }
    }

    /// Whether reaching this status returns the money to the wallet
    pub fn refunds(&self) -> bool {
        matches!(self, WithdrawalStatus::Failed | WithdrawalStatus::Reversed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reference: String,

    /// Minor units
    pub amount: i64,

    pub bank_code: String,
    pub bank_name: String,
    pub account_no: String,
    pub account_name: String,
    pub status: WithdrawalStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawal {
    pub user_id: Uuid,
    pub reference: String,
    pub amount: i64,
    pub bank_code: String,
    pub bank_name: String,
    pub account_no: String,
    pub account_name: String,
}

impl Withdrawal {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateWithdrawal,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            INSERT INTO withdrawals (user_id, reference, amount, bank_code, bank_name, account_no, account_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.reference)
        .bind(data.amount)
        .bind(data.bank_code)
        .bind(data.bank_name)
        .bind(data.account_no)
        .bind(data.account_name)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(pool)
        .await
    }

    pub async fn lock_by_reference(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Moves a pending withdrawal to a final status; `None` if it was not pending
    pub async fn finalize(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: WithdrawalStatus,
        failure_reason: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET status = $2, failure_reason = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(failure_reason)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Records a transfer error on a withdrawal that stays pending; `None` if it was
    /// already settled
    pub async fn note_transfer_error(
        pool: &PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET failure_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(error)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM withdrawals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Total paid out through completed withdrawals (admin dashboard)
    pub async fn total_completed(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM withdrawals WHERE status = 'completed'",
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refunding_statuses() {
        assert!(WithdrawalStatus::Failed.refunds());
        assert!(WithdrawalStatus::Reversed.refunds());
        assert!(!WithdrawalStatus::Completed.refunds());
        assert!(!WithdrawalStatus::Pending.refunds());
    }
}
