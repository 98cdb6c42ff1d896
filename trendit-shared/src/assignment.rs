//! Task allocation for performers
//!
//! A performer asks for work by type and platform (adverts) or goal (engagements) and
//! receives one random matching task. Allocation, proof submission and cancellation all
//! keep `tasks.total_allocated` in step with the performances that hold a slot.
//!
//! # Concurrency
//!
//! Candidate tasks are picked with `FOR UPDATE SKIP LOCKED`, so two performers asking at
//! the same moment never both take the last slot of a task. The partial unique index
//! `idx_performances_one_pending` makes "one pending performance per user" hold even if
//! the same user fires two requests at once; the loser gets [`AssignmentError::PendingTask`].

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::performance::{PerformanceStatus, TaskPerformance};
use crate::models::task::{Task, TaskType, TASK_COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("There is still a pending task yet to be done.")]
    PendingTask,

    #[error("There are no tasks available for you at the moment.")]
    NoUnassignedTask,

    #[error("Invalid task type: {0}")]
    InvalidTaskType(String),

    #[error("Task not found")]
    TaskNotFound,

    #[error("Task performance not found")]
    PerformanceNotFound,

    /// The user already submitted (or finished with) this task
    #[error("You have already performed this task")]
    AlreadyPerformed,

    #[error("Task performance is {0}")]
    InvalidState(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What kind of work a performer is asking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCriteria {
    Advert { platform: String },
    Engagement { goal: String },
}

impl TaskCriteria {
    /// Builds criteria from request fields
    ///
    /// Adverts need `platform`; engagements need `goal`. Values are matched lowercased.
    pub fn parse(
        task_type: &str,
        platform: Option<&str>,
        goal: Option<&str>,
    ) -> Result<Self, AssignmentError> {
        let non_empty = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_lowercase);

        match TaskType::parse(task_type) {
            Some(TaskType::Advert) => non_empty(platform)
                .map(|platform| TaskCriteria::Advert { platform })
                .ok_or_else(|| AssignmentError::InvalidTaskType("advert tasks need a platform".to_string())),
            Some(TaskType::Engagement) => non_empty(goal)
                .map(|goal| TaskCriteria::Engagement { goal })
                .ok_or_else(|| AssignmentError::InvalidTaskType("engagement tasks need a goal".to_string())),
            None => Err(AssignmentError::InvalidTaskType(task_type.to_string())),
        }
    }

    fn task_type(&self) -> TaskType {
        match self {
            TaskCriteria::Advert { .. } => TaskType::Advert,
            TaskCriteria::Engagement { .. } => TaskType::Engagement,
        }
    }

    fn value(&self) -> &str {
        match self {
            TaskCriteria::Advert { platform } => platform,
            TaskCriteria::Engagement { goal } => goal,
        }
    }
}

/// A freshly allocated task
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub performance: TaskPerformance,
    pub task: Task,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Allocates a random matching task to `user_id`
///
/// # Errors
///
/// - `PendingTask` if the user already holds a pending performance
/// - `NoUnassignedTask` if nothing matches
pub async fn generate_task(
    pool: &PgPool,
    user_id: Uuid,
    criteria: &TaskCriteria,
) -> Result<Assignment, AssignmentError> {
    let mut tx = pool.begin().await?;

    if TaskPerformance::find_pending_for_user(&mut *tx, user_id).await?.is_some() {
        return Err(AssignmentError::PendingTask);
    }

    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        SELECT {TASK_COLUMNS} FROM tasks t
        WHERE t.status = 'approved'
          AND t.payment_status = 'complete'
          AND t.task_type = $2
          AND CASE WHEN t.task_type = 'advert' THEN t.platform ELSE t.goal END = $3
          AND CASE WHEN t.task_type = 'advert' THEN t.posts_count ELSE t.engagements_count END
              > t.total_allocated
          AND t.creator_id <> $1
          AND NOT EXISTS (
              SELECT 1 FROM task_performances p WHERE p.task_id = t.id AND p.user_id = $1
          )
        ORDER BY random()
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#
    ))
    .bind(user_id)
    .bind(criteria.task_type())
    .bind(criteria.value())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AssignmentError::NoUnassignedTask)?;

    let performance = TaskPerformance::create_pending(
        &mut *tx,
        user_id,
        task.id,
        task.task_type,
        task.reward_per_slot(),
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AssignmentError::PendingTask
        } else {
            AssignmentError::Database(e)
        }
    })?;

    Task::allocate_slot(&mut *tx, task.id).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        task_id = %task.id,
        performance_id = %performance.id,
        reward = performance.reward_money,
        "Task allocated"
    );

    Ok(Assignment { performance, task })
}

/// Submits proof for the user's pending performance of a task
///
/// `task_id_or_key` accepts a task UUID or its public key.
pub async fn submit_proof(
    pool: &PgPool,
    user_id: Uuid,
    task_id_or_key: &str,
    account_name: &str,
    proof_screenshot_url: &str,
) -> Result<TaskPerformance, AssignmentError> {
    let task = Task::find_by_id_or_key(pool, task_id_or_key)
        .await?
        .ok_or(AssignmentError::TaskNotFound)?;

    let existing = TaskPerformance::find_by_user_and_task(pool, user_id, task.id)
        .await?
        .ok_or(AssignmentError::PerformanceNotFound)?;

    if existing.status != PerformanceStatus::Pending {
        return Err(AssignmentError::AlreadyPerformed);
    }

    let performance = TaskPerformance::submit(pool, existing.id, account_name, proof_screenshot_url)
        .await?
        // Expired or cancelled between the two statements
        .ok_or(AssignmentError::InvalidState("no longer pending"))?;

    tracing::info!(user_id = %user_id, performance_id = %performance.id, "Task proof submitted");

    Ok(performance)
}

/// Gives up a pending performance and frees its slot
pub async fn cancel_performance(
    pool: &PgPool,
    user_id: Uuid,
    performance_id: Uuid,
) -> Result<TaskPerformance, AssignmentError> {
    let mut tx = pool.begin().await?;

    let performance = TaskPerformance::lock_by_id(&mut tx, performance_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or(AssignmentError::PerformanceNotFound)?;

    let cancelled = TaskPerformance::transition(
        &mut *tx,
        performance.id,
        PerformanceStatus::Pending,
        PerformanceStatus::Cancelled,
    )
    .await?
    .ok_or(AssignmentError::InvalidState(performance.status.as_str()))?;

    Task::release_slot(&mut *tx, cancelled.task_id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, performance_id = %performance_id, "Task performance cancelled");

    Ok(cancelled)
}

/// Deletes a performance that is pending, cancelled or failed
///
/// Deleting a pending performance frees its slot.
pub async fn delete_performance(
    pool: &PgPool,
    user_id: Uuid,
    performance_id: Uuid,
) -> Result<(), AssignmentError> {
    let mut tx = pool.begin().await?;

    let performance = TaskPerformance::lock_by_id(&mut tx, performance_id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or(AssignmentError::PerformanceNotFound)?;

    if !performance.status.is_deletable() {
        return Err(AssignmentError::InvalidState(performance.status.as_str()));
    }

    TaskPerformance::delete(&mut *tx, performance.id).await?;

    if performance.status == PerformanceStatus::Pending {
        Task::release_slot(&mut *tx, performance.task_id).await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = %user_id, performance_id = %performance_id, "Task performance deleted");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_parse() {
        assert_eq!(
            TaskCriteria::parse("advert", Some(" Instagram "), None).unwrap(),
            TaskCriteria::Advert {
                platform: "instagram".to_string()
            }
        );
        assert_eq!(
            TaskCriteria::parse("engagement", None, Some("Follow")).unwrap(),
            TaskCriteria::Engagement {
                goal: "follow".to_string()
            }
        );
    }

    #[test]
    fn test_criteria_parse_rejects() {
        assert!(matches!(
            TaskCriteria::parse("survey", Some("x"), None),
            Err(AssignmentError::InvalidTaskType(_))
        ));
        assert!(matches!(
            TaskCriteria::parse("advert", None, Some("follow")),
            Err(AssignmentError::InvalidTaskType(_))
        ));
        assert!(matches!(
            TaskCriteria::parse("engagement", Some("x"), Some("  ")),
            Err(AssignmentError::InvalidTaskType(_))
        ));
    }

    #[test]
    fn test_pending_task_message() {
        assert_eq!(
            AssignmentError::PendingTask.to_string(),
            "There is still a pending task yet to be done."
        );
    }
}
