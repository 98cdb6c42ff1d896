//! Idempotent settlement of gateway payments and withdrawals
//!
//! A gateway payment can be confirmed three ways: the payer's client calls
//! `POST /v1/payment/verify`, the gateway delivers a webhook, or the worker polls. All
//! three end in [`settle_payment`], which locks the payment row and acts only while it is
//! still `pending`. Whichever caller arrives first applies the effect; the others see
//! `AlreadySettled`. Wallet credits are additionally keyed by the payment reference in the
//! ledger, so even a bug here could not credit twice.
//!
//! Withdrawals follow the same pattern through [`settle_withdrawal`].
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::payments::PaymentGateway;
//! use trendit_shared::settlement::{settle_payment, SettlementOutcome};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool, gateway: &dyn PaymentGateway) -> anyhow::Result<()> {
//! let verification = gateway.verify("pay-1700000000-AbCdEfGhIjKl").await?;
//!
//! match settle_payment(&pool, &verification, None).await? {
//!     SettlementOutcome::Settled(payment) => println!("now {}", payment.status.as_str()),
//!     SettlementOutcome::AlreadySettled(_) => println!("nothing to do"),
//!     SettlementOutcome::StillPending(_) => println!("try again later"),
//! }
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use sqlx::PgPool;

use crate::models::notification::{Notification, NotificationKind};
use crate::models::payment::{Payment, PaymentStatus, PaymentType};
use crate::models::task::{Task, TaskStatus};
use crate::models::user::User;
use crate::models::withdrawal::{Withdrawal, WithdrawalStatus};
use crate::payments::{GatewayStatus, Verification};
use crate::reference;
use crate::telegram::TelegramNotifier;
use crate::wallet::{self, WalletError};

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What a settlement call did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum SettlementOutcome<T> {
    /// This call moved the record to its final status
    Settled(T),

    /// Another caller settled it first; nothing was changed
    AlreadySettled(T),

    /// The gateway has no final answer yet; nothing was changed
    StillPending(T),
}

impl<T> SettlementOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            SettlementOutcome::Settled(record)
            | SettlementOutcome::AlreadySettled(record)
            | SettlementOutcome::StillPending(record) => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            SettlementOutcome::Settled(record)
            | SettlementOutcome::AlreadySettled(record)
            | SettlementOutcome::StillPending(record) => record,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SettlementOutcome::Settled(_))
    }
}

/// Final payment status for a gateway answer, or `None` while the gateway is undecided
fn target_status(payment: &Payment, verification: &Verification) -> Option<PaymentStatus> {
    match verification.status {
        GatewayStatus::Success if verification.amount >= payment.amount => Some(PaymentStatus::Complete),
        GatewayStatus::Success => {
            tracing::warn!(
                reference = %payment.reference,
                expected = payment.amount,
                received = verification.amount,
                "Gateway amount below recorded amount"
            );
            Some(PaymentStatus::Failed)
        }
        GatewayStatus::Failed => Some(PaymentStatus::Failed),
        GatewayStatus::Abandoned => Some(PaymentStatus::Abandoned),
        GatewayStatus::Pending => None,
    }
}

/// Settles a gateway payment from the gateway's verification
///
/// # Errors
///
/// - `PaymentNotFound` if no payment carries the reference
/// - `Wallet` / `Database` on failure; the transaction is rolled back and the payment
///   stays `pending`, so the call can be retried
pub async fn settle_payment(
    pool: &PgPool,
    verification: &Verification,
    telegram: Option<&TelegramNotifier>,
) -> Result<SettlementOutcome<Payment>, SettlementError> {
    let mut tx = pool.begin().await?;

    let payment = Payment::lock_by_reference(&mut tx, &verification.reference)
        .await?
        .ok_or_else(|| SettlementError::PaymentNotFound(verification.reference.clone()))?;

    if payment.status != PaymentStatus::Pending {
        tx.commit().await?;
        return Ok(SettlementOutcome::AlreadySettled(payment));
    }

    let Some(status) = target_status(&payment, verification) else {
        tx.commit().await?;
        return Ok(SettlementOutcome::StillPending(payment));
    };

    let Some(payment) = Payment::finalize(&mut tx, payment.id, status).await? else {
        // Unreachable while the row lock is held; treat as settled elsewhere
        tx.rollback().await?;
        let current = Payment::find_by_reference(pool, &verification.reference)
            .await?
            .ok_or_else(|| SettlementError::PaymentNotFound(verification.reference.clone()))?;
        return Ok(SettlementOutcome::AlreadySettled(current));
    };

    let mut paid_task = None;

    match payment.payment_type {
        PaymentType::CreditWallet if status == PaymentStatus::Complete => {
            wallet::credit(
                &mut tx,
                payment.user_id,
                payment.amount,
                &payment.reference,
                "Wallet top-up",
            )
            .await?;
        }
        PaymentType::TaskCreation => {
            if let Some(task_key) = payment.meta.get("task_key").and_then(|v| v.as_str()) {
                if let Some(task) = Task::lock_by_key(&mut tx, task_key).await? {
                    let settled = Task::settle_payment_status(&mut *tx, task.id, status).await?;

                    // Declined before the money arrived: the task never goes live
                    if status == PaymentStatus::Complete && task.status == TaskStatus::Declined {
                        wallet::credit(
                            &mut tx,
                            task.creator_id,
                            task.fee,
                            &reference::task_refund_reference(&task.task_key),
                            "Refund for declined task",
                        )
                        .await?;
                        Notification::create(
                            &mut *tx,
                            task.creator_id,
                            None,
                            NotificationKind::Notification,
                            &format!(
                                "Payment for declined task {} arrived; ₦{:.2} has been refunded to your wallet.",
                                task.task_key,
                                task.fee as f64 / 100.0
                            ),
                        )
                        .await?;
                        tracing::info!(reference = %payment.reference, task_key, "Late payment for declined task refunded");
                    } else if status == PaymentStatus::Complete {
                        paid_task = settled;
                    }
                } else {
                    tracing::warn!(reference = %payment.reference, task_key, "Task for payment not found");
                }
            }
        }
        PaymentType::MembershipFee if status == PaymentStatus::Complete => {
            User::mark_membership_paid(&mut *tx, payment.user_id).await?;
        }
        _ => {}
    }

    tx.commit().await?;

    tracing::info!(
        reference = %payment.reference,
        payment_type = payment.payment_type.as_str(),
        status = status.as_str(),
        amount = payment.amount,
        "Payment settled"
    );

    if let (Some(task), Some(telegram)) = (paid_task, telegram) {
        telegram.notify_task_paid(&task);
    }

    Ok(SettlementOutcome::Settled(payment))
}

/// Settles a withdrawal with the payout's final outcome
///
/// `failed` and `reversed` return the money to the wallet under the withdrawal
/// reference. A `pending` outcome changes nothing.
pub async fn settle_withdrawal(
    pool: &PgPool,
    reference: &str,
    outcome: WithdrawalStatus,
    failure_reason: Option<&str>,
) -> Result<SettlementOutcome<Withdrawal>, SettlementError> {
    let mut tx = pool.begin().await?;

    let withdrawal = Withdrawal::lock_by_reference(&mut tx, reference)
        .await?
        .ok_or_else(|| SettlementError::WithdrawalNotFound(reference.to_string()))?;

    if withdrawal.status != WithdrawalStatus::Pending {
        tx.commit().await?;
        return Ok(SettlementOutcome::AlreadySettled(withdrawal));
    }

    if outcome == WithdrawalStatus::Pending {
        tx.commit().await?;
        return Ok(SettlementOutcome::StillPending(withdrawal));
    }

    if outcome.refunds() {
        wallet::credit(
            &mut tx,
            withdrawal.user_id,
            withdrawal.amount,
            &withdrawal.reference,
            "Withdrawal refund",
        )
        .await?;
    }

    let Some(withdrawal) = Withdrawal::finalize(&mut tx, withdrawal.id, outcome, failure_reason).await?
    else {
        tx.rollback().await?;
        let current = Withdrawal::find_by_reference(pool, reference)
            .await?
            .ok_or_else(|| SettlementError::WithdrawalNotFound(reference.to_string()))?;
        return Ok(SettlementOutcome::AlreadySettled(current));
    };

    let body = match outcome {
        WithdrawalStatus::Completed => format!(
            "Your withdrawal of ₦{:.2} has been paid to {}.",
            withdrawal.amount as f64 / 100.0,
            withdrawal.bank_name
        ),
        _ => format!(
            "Your withdrawal of ₦{:.2} could not be completed and has been returned to your wallet.",
            withdrawal.amount as f64 / 100.0
        ),
    };
    Notification::create(&mut *tx, withdrawal.user_id, None, NotificationKind::Activity, &body).await?;

    tx.commit().await?;

    tracing::info!(
        reference = %withdrawal.reference,
        status = withdrawal.status.as_str(),
        amount = withdrawal.amount,
        "Withdrawal settled"
    );

    Ok(SettlementOutcome::Settled(withdrawal))
}
