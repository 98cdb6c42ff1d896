//! Payment model
//!
//! A payment is the gateway-facing lifecycle record of money coming in: it is written
//! `pending` before the gateway is called and moved to a final status exactly once by
//! [`crate::settlement`]. Wallet-funded task payments are written `complete` directly.
//!
//! # State Machine
//!
//! ```text
//! pending → complete
//!         → failed
//!         → abandoned
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE payment_type AS ENUM ('task-creation', 'membership-fee', 'credit-wallet', 'item-upload');
//! CREATE TYPE payment_method AS ENUM ('wallet', 'paystack', 'flutterwave');
//! CREATE TYPE payment_status AS ENUM ('pending', 'complete', 'failed', 'abandoned');
//!
//! CREATE TABLE payments (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     reference VARCHAR(64) NOT NULL UNIQUE,
//!     amount BIGINT NOT NULL CHECK (amount > 0),
//!     payment_type payment_type NOT NULL,
//!     payment_method payment_method NOT NULL,
//!     status payment_status NOT NULL DEFAULT 'pending',
//!     meta JSONB NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     settled_at TIMESTAMPTZ
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, user_id, reference, amount, payment_type, payment_method, \
     status, meta, created_at, updated_at, settled_at";

/// What a payment pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PaymentType {
    TaskCreation,
    MembershipFee,
    CreditWallet,
    ItemUpload,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::TaskCreation => "task-creation",
            PaymentType::MembershipFee => "membership-fee",
            PaymentType::CreditWallet => "credit-wallet",
            PaymentType::ItemUpload => "item-upload",
        }
    }

    /// Parses a client-supplied type; `None` for anything unsupported
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task-creation" => Some(PaymentType::TaskCreation),
            "membership-fee" => Some(PaymentType::MembershipFee),
            "credit-wallet" => Some(PaymentType::CreditWallet),
            "item-upload" => Some(PaymentType::ItemUpload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Paystack,
    Flutterwave,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Paystack => "paystack",
            PaymentMethod::Flutterwave => "flutterwave",
        }
    }
}

/// Payment lifecycle status; also used for `tasks.payment_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Complete,
    Failed,
    Abandoned,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Complete => "complete",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Complete)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Pending, PaymentStatus::Abandoned)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Internally generated, unique; also the gateway `reference` / `tx_ref`
    pub reference: String,

    /// Minor units
    pub amount: i64,

    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,

    /// Free-form metadata, e.g. `{"task_key": "..."}` for task payments
    pub meta: JsonValue,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub user_id: Uuid,
    pub reference: String,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub meta: JsonValue,
}

impl Payment {
    /// Records a payment
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreatePayment,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (user_id, reference, amount, payment_type, payment_method, status, meta, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $6 = 'pending'::payment_status THEN NULL ELSE NOW() END)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.reference)
        .bind(data.amount)
        .bind(data.payment_type)
        .bind(data.payment_method)
        .bind(data.status)
        .bind(data.meta)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_reference(
        pool: &PgPool,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(pool)
        .await
    }

    /// Loads a payment and holds a row lock until the transaction ends
    pub async fn lock_by_reference(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Moves a pending payment to a final status
    ///
    /// Returns `None` if the payment was not pending.
    pub async fn finalize(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2, settled_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Marks a payment failed when the gateway refused to initialise it
    pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let payment = Self::finalize(&mut tx, id, PaymentStatus::Failed).await?;
        tx.commit().await?;
        Ok(payment)
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
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
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Gateway payments still pending and created before `older_than`, oldest first
    pub async fn list_stale_pending(
        pool: &PgPool,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE status = 'pending'
              AND payment_method <> 'wallet'
              AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Total of completed payments, excluding wallet top-ups
    ///
    /// `since` restricts to payments settled at or after the given instant.
    pub async fn total_spent(
        pool: &PgPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
            WHERE user_id = $1
              AND status = 'complete'
              AND payment_type <> 'credit-wallet'
              AND ($2::timestamptz IS NULL OR settled_at >= $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Total of completed gateway payments across the platform
    pub async fn total_received(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments
            WHERE status = 'complete' AND payment_method <> 'wallet'
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_parse() {
        assert_eq!(PaymentType::parse("task-creation"), Some(PaymentType::TaskCreation));
        assert_eq!(PaymentType::parse("membership-fee"), Some(PaymentType::MembershipFee));
        assert_eq!(PaymentType::parse("credit-wallet"), Some(PaymentType::CreditWallet));
        assert_eq!(PaymentType::parse("item-upload"), Some(PaymentType::ItemUpload));
        assert_eq!(PaymentType::parse("donation"), None);
        assert_eq!(PaymentType::CreditWallet.as_str(), "credit-wallet");
    }

    #[test]
    fn test_payment_type_serde_is_kebab_case() {
        let json = serde_json::to_string(&PaymentType::MembershipFee).unwrap();
        assert_eq!(json, "\"membership-fee\"");
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Complete));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Abandoned));
        assert!(!PaymentStatus::Complete.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Complete));

        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Abandoned.is_terminal());
    }
}
