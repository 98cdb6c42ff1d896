//! Wallet ledger: the only code that changes a wallet balance
//!
//! Every credit and debit
//!
//! 1. runs inside a transaction owned by the caller, under a savepoint, so a failed
//!    operation leaves the caller's transaction exactly as it was;
//! 2. inserts an append-only row into `transactions`, keyed by the unique pair
//!    `(reference, transaction_type)`. Replaying a reference is a no-op reported as
//!    `applied = false`;
//! 3. moves the balance with one compare-and-swap `UPDATE`, so two debits racing for the
//!    same money cannot both succeed and the balance never goes negative;
//! 4. records `balance_after` on the ledger row.
//!
//! Payment settlement, task funding, rewards, refunds and withdrawals all go through
//! [`credit`] and [`debit`].
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::wallet::{credit, debit, WalletError};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), WalletError> {
//! let mut tx = pool.begin().await?;
//! credit(&mut tx, user_id, 50_000, "pay-1700000000-AbCdEfGhIjKl", "Wallet top-up").await?;
//!
//! // Replaying the same reference changes nothing
//! let replay = credit(&mut tx, user_id, 50_000, "pay-1700000000-AbCdEfGhIjKl", "Wallet top-up").await?;
//! assert!(!replay.applied);
//!
//! debit(&mut tx, user_id, 20_000, "wdr-1700000001-MnOpQrStUvWx", "Withdrawal").await?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use sqlx::{Connection, PgExecutor, Postgres, Transaction};
use uuid::Uuid;

use crate::models::transaction::TransactionType;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerOutcome {
    /// Balance after the operation (or the current balance when not applied)
    pub balance: i64,

    /// False when the reference had already been recorded for this direction
    pub applied: bool,
}

/// Credits a wallet
///
/// # Errors
///
/// - `WalletError::InvalidAmount` for `amount <= 0`
/// - `WalletError::WalletNotFound` if the user has no wallet
pub async fn credit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
    reference: &str,
    description: &str,
) -> Result<LedgerOutcome, WalletError> {
    apply(tx, user_id, TransactionType::Credit, amount, reference, description).await
}

/// Debits a wallet
///
/// # Errors
///
/// - `WalletError::InvalidAmount` for `amount <= 0`
/// - `WalletError::InsufficientBalance` if the balance is below `amount`
/// - `WalletError::WalletNotFound` if the user has no wallet
pub async fn debit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
    reference: &str,
    description: &str,
) -> Result<LedgerOutcome, WalletError> {
    apply(tx, user_id, TransactionType::Debit, amount, reference, description).await
}

/// Reads a user's balance
pub async fn balance<'e, E: PgExecutor<'e>>(executor: E, user_id: Uuid) -> Result<i64, WalletError> {
    sqlx::query_scalar::<_, i64>("SELECT balance FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    direction: TransactionType,
    amount: i64,
    reference: &str,
    description: &str,
) -> Result<LedgerOutcome, WalletError> {
    if amount <= 0 {
        return Err(WalletError::InvalidAmount(amount));
    }

    let mut savepoint = (**tx).begin().await?;

    let entry_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO transactions (user_id, reference, transaction_type, amount, description)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (reference, transaction_type) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(reference)
    .bind(direction)
    .bind(amount)
    .bind(description)
    .fetch_optional(&mut *savepoint)
    .await?;

    let Some(entry_id) = entry_id else {
        let current = balance(&mut *savepoint, user_id).await?;
        savepoint.commit().await?;

        tracing::debug!(
            user_id = %user_id,
            reference = reference,
            direction = direction.as_str(),
            "ledger reference already applied"
        );
        return Ok(LedgerOutcome {
            balance: current,
            applied: false,
        });
    };

    let new_balance = match direction {
        TransactionType::Credit => {
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE wallets SET balance = balance + $2, updated_at = NOW()
                WHERE user_id = $1
                RETURNING balance
                "#,
            )
            .bind(user_id)
            .bind(amount)
            .fetch_optional(&mut *savepoint)
            .await?
        }
        TransactionType::Debit => {
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE wallets SET balance = balance - $2, updated_at = NOW()
                WHERE user_id = $1 AND balance >= $2
                RETURNING balance
                "#,
            )
            .bind(user_id)
            .bind(amount)
            .fetch_optional(&mut *savepoint)
            .await?
        }
    };

    let Some(new_balance) = new_balance else {
        // Rolling back the savepoint discards the ledger row inserted above
        let available = balance(&mut *savepoint, user_id).await?;
        savepoint.rollback().await?;
        return Err(WalletError::InsufficientBalance {
            required: amount,
            available,
        });
    };

    sqlx::query("UPDATE transactions SET balance_after = $2 WHERE id = $1")
        .bind(entry_id)
        .bind(new_balance)
        .execute(&mut *savepoint)
        .await?;

    savepoint.commit().await?;

    tracing::info!(
        user_id = %user_id,
        reference = reference,
        direction = direction.as_str(),
        amount = amount,
        balance = new_balance,
        "wallet ledger entry applied"
    );

    Ok(LedgerOutcome {
        balance: new_balance,
        applied: true,
    })
}
