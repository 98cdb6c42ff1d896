//! Periodic maintenance jobs
//!
//! - [`expire_stale_performances`]: performances left `pending` past the timeout become
//!   `failed` and give their slot back to the task.
//! - [`reconcile_pending_payments`]: gateway payments nobody verified are asked about
//!   again and settled through the same path as webhooks. Payments the gateway still
//!   reports pending after [`ABANDON_AFTER_HOURS`] are closed as `abandoned`.
//!
//! Every job is safe to run concurrently with the API and with other workers.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use trendit_shared::{
    models::{
        payment::{Payment, PaymentStatus},
        performance::TaskPerformance,
        task::Task,
    },
    payments::{GatewayError, GatewayStatus, PaymentGateway, Verification},
    settlement::{settle_payment, SettlementError, SettlementOutcome},
    telegram::TelegramNotifier,
};

/// A payment the gateway still calls pending after this long is abandoned
pub const ABANDON_AFTER_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),
}

/// What one reconciliation sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub settled: usize,
    pub abandoned: usize,
    pub still_pending: usize,
    pub errors: usize,
}

/// Fails pending performances started more than `timeout` ago
///
/// Returns how many were expired.
pub async fn expire_stale_performances(
    pool: &PgPool,
    timeout: Duration,
    batch_size: i64,
) -> Result<usize, JobError> {
    let cutoff = Utc::now() - timeout;

    let mut tx = pool.begin().await?;

    let expired = TaskPerformance::expire_stale(&mut tx, cutoff, batch_size).await?;
    for performance in &expired {
        Task::release_slot(&mut *tx, performance.task_id).await?;
    }

    tx.commit().await?;

    for performance in &expired {
        tracing::info!(
            performance_id = %performance.id,
            user_id = %performance.user_id,
            task_id = %performance.task_id,
            "Pending performance expired"
        );
    }

    Ok(expired.len())
}

/// Verifies one pending payment with the gateway and settles it
///
/// A payment created before `abandon_before` that the gateway still reports pending is
/// settled as abandoned.
pub async fn reconcile_payment(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    telegram: Option<&TelegramNotifier>,
    payment: &Payment,
    abandon_before: DateTime<Utc>,
) -> Result<SettlementOutcome<Payment>, JobError> {
    let mut verification = gateway.verify(&payment.reference).await?;

    if verification.status == GatewayStatus::Pending && payment.created_at < abandon_before {
        verification = Verification {
            reference: payment.reference.clone(),
            status: GatewayStatus::Abandoned,
            amount: verification.amount,
        };
    }

    Ok(settle_payment(pool, &verification, telegram).await?)
}

/// Reconciles gateway payments pending for longer than `older_than`
///
/// A failure on one payment is logged and counted; the sweep carries on with the rest.
pub async fn reconcile_pending_payments(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    telegram: Option<&TelegramNotifier>,
    older_than: Duration,
    batch_size: i64,
) -> Result<ReconcileSummary, JobError> {
    let now = Utc::now();
    let abandon_before = now - Duration::hours(ABANDON_AFTER_HOURS);

    let stale = Payment::list_stale_pending(pool, now - older_than, batch_size).await?;

    let mut summary = ReconcileSummary {
        checked: stale.len(),
        ..ReconcileSummary::default()
    };

    for payment in &stale {
        match reconcile_payment(pool, gateway, telegram, payment, abandon_before).await {
            Ok(SettlementOutcome::Settled(settled)) if settled.status == PaymentStatus::Abandoned => {
                summary.abandoned += 1;
            }
            Ok(SettlementOutcome::Settled(_)) => summary.settled += 1,
            Ok(SettlementOutcome::StillPending(_)) => summary.still_pending += 1,
            Ok(SettlementOutcome::AlreadySettled(_)) => {}
            Err(e) => {
                summary.errors += 1;
                tracing::warn!(reference = %payment.reference, error = %e, "Payment reconciliation failed");
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_messages() {
        let err = JobError::from(SettlementError::PaymentNotFound("pay-1".to_string()));
        assert!(err.to_string().starts_with("Settlement error"));

        let err = JobError::from(GatewayError::Api("declined".to_string()));
        assert!(err.to_string().contains("declined"));
    }
}
