//! Admin review of tasks and task performances
//!
//! Shared by the admin HTTP routes and the Telegram webhook so both paths apply exactly
//! the same state changes. Each decision runs in one transaction with the row locked;
//! a second decision on the same row fails with [`ReviewError::InvalidState`].
//!
//! | Decision | Effect |
//! |---|---|
//! | approve task | `pending → approved` |
//! | reject task | `pending → declined`, fee refunded as `refund-<task_key>` if paid |
//! | accept performance | `in_review → accepted`, `total_success += 1`, reward credited as `reward-<id>` |
//! | reject performance | `in_review → rejected`, slot released |

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::notification::{Notification, NotificationKind};
use crate::models::payment::PaymentStatus;
use crate::models::performance::{PerformanceStatus, TaskPerformance};
use crate::models::task::{Task, TaskStatus};
use crate::reference;
use crate::wallet::{self, WalletError};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Task not found")]
    TaskNotFound,

    #[error("Task performance not found")]
    PerformanceNotFound,

    #[error("Cannot review: currently {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Approves a pending task
pub async fn approve_task(pool: &PgPool, task_id: Uuid, reviewer: Option<Uuid>) -> Result<Task, ReviewError> {
    let mut tx = pool.begin().await?;

    let task = Task::lock_by_id(&mut tx, task_id)
        .await?
        .ok_or(ReviewError::TaskNotFound)?;

    let approved = Task::review(&mut *tx, task.id, TaskStatus::Approved)
        .await?
        .ok_or(ReviewError::InvalidState(task.status.as_str()))?;

    Notification::create(
        &mut *tx,
        approved.creator_id,
        reviewer,
        NotificationKind::Notification,
        &format!("Your {} task {} has been approved.", approved.task_type.as_str(), approved.task_key),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(task_id = %task_id, "Task approved");

    Ok(approved)
}

/// Declines a pending task, refunding the fee if it was paid
pub async fn reject_task(pool: &PgPool, task_id: Uuid, reviewer: Option<Uuid>) -> Result<Task, ReviewError> {
    let mut tx = pool.begin().await?;

    let task = Task::lock_by_id(&mut tx, task_id)
        .await?
        .ok_or(ReviewError::TaskNotFound)?;

    let declined = Task::review(&mut *tx, task.id, TaskStatus::Declined)
        .await?
        .ok_or(ReviewError::InvalidState(task.status.as_str()))?;

    let refunded = declined.payment_status == PaymentStatus::Complete;
    if refunded {
        wallet::credit(
            &mut tx,
            declined.creator_id,
            declined.fee,
            &reference::task_refund_reference(&declined.task_key),
            "Refund for declined task",
        )
        .await?;
    }

    let body = if refunded {
        format!(
            "Your task {} was declined and ₦{:.2} has been refunded to your wallet.",
            declined.task_key,
            declined.fee as f64 / 100.0
        )
    } else {
        format!("Your task {} was declined.", declined.task_key)
    };
    Notification::create(&mut *tx, declined.creator_id, reviewer, NotificationKind::Notification, &body).await?;

    tx.commit().await?;

    tracing::info!(task_id = %task_id, refunded, "Task declined");

    Ok(declined)
}

/// Accepts a submitted performance and pays the reward
pub async fn accept_performance(
    pool: &PgPool,
    performance_id: Uuid,
    reviewer: Option<Uuid>,
) -> Result<TaskPerformance, ReviewError> {
    let mut tx = pool.begin().await?;

    let performance = TaskPerformance::lock_by_id(&mut tx, performance_id)
        .await?
        .ok_or(ReviewError::PerformanceNotFound)?;

    let accepted = TaskPerformance::transition(
        &mut *tx,
        performance.id,
        PerformanceStatus::InReview,
        PerformanceStatus::Accepted,
    )
    .await?
    .ok_or(ReviewError::InvalidState(performance.status.as_str()))?;

    Task::record_success(&mut *tx, accepted.task_id).await?;

    if accepted.reward_money > 0 {
        wallet::credit(
            &mut tx,
            accepted.user_id,
            accepted.reward_money,
            &reference::reward_reference(accepted.id),
            "Task reward",
        )
        .await?;
    }

    Notification::create(
        &mut *tx,
        accepted.user_id,
        reviewer,
        NotificationKind::Notification,
        &format!(
            "Your task submission was accepted. ₦{:.2} has been added to your wallet.",
            accepted.reward_money as f64 / 100.0
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        performance_id = %performance_id,
        user_id = %accepted.user_id,
        reward = accepted.reward_money,
        "Task performance accepted"
    );

    Ok(accepted)
}

/// Rejects a submitted performance and frees its slot
pub async fn reject_performance(
    pool: &PgPool,
    performance_id: Uuid,
    reviewer: Option<Uuid>,
) -> Result<TaskPerformance, ReviewError> {
    let mut tx = pool.begin().await?;

    let performance = TaskPerformance::lock_by_id(&mut tx, performance_id)
        .await?
        .ok_or(ReviewError::PerformanceNotFound)?;

    let rejected = TaskPerformance::transition(
        &mut *tx,
        performance.id,
        PerformanceStatus::InReview,
        PerformanceStatus::Rejected,
    )
    .await?
    .ok_or(ReviewError::InvalidState(performance.status.as_str()))?;

    Task::release_slot(&mut *tx, rejected.task_id).await?;

    Notification::create(
        &mut *tx,
        rejected.user_id,
        reviewer,
        NotificationKind::Notification,
        "Your task submission was rejected.",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(performance_id = %performance_id, "Task performance rejected");

    Ok(rejected)
}
