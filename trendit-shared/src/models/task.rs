//! Task model and database operations
//!
//! A task is a paid unit of work posted by an advertiser: either an advert (post our
//! content N times) or an engagement (follow/like/comment N times). Performers are
//! allocated one slot at a time by [`crate::assignment`].
//!
//! # State Machine
//!
//! ```text
//! status:          pending → approved
//!                  pending → declined
//! payment_status:  pending → complete | failed | abandoned
//! ```
//!
//! A task is visible to performers only when `status = 'approved'` and
//! `payment_status = 'complete'`.
//!
//! # Slots
//!
//! `target()` is `posts_count` for adverts and `engagements_count` for engagements.
//! `total_allocated` counts slots handed out and not yet released; a slot is released
//! when a performance is rejected, cancelled or times out. `total_success` counts accepted
//! performances.
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::models::task::{Task, CreateTask, TaskType};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, creator_id: Uuid) -> Result<(), sqlx::Error> {
//! let task = Task::create(&pool, CreateTask {
//!     creator_id,
//!     task_type: TaskType::Engagement,
//!     platform: "instagram".to_string(),
//!     fee: 500_000,
//!     goal: Some("follow".to_string()),
//!     account_link: Some("https://instagram.com/trendit".to_string()),
//!     engagements_count: 50,
//!     ..CreateTask::default()
//! }).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::payment::PaymentStatus;

pub(crate) const TASK_COLUMNS: &str = "id, task_key, creator_id, task_type, platform, fee, status, \
     payment_status, total_allocated, total_success, posts_count, target_country, target_state, \
     gender, caption, hashtags, goal, account_link, engagements_count, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Advert,
    Engagement,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Advert => "advert",
            TaskType::Engagement => "engagement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "advert" => Some(TaskType::Advert),
            "engagement" => Some(TaskType::Engagement),
            _ => None,
        }
    }
}

/// Review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Approved,
    Declined,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Approved => "approved",
            TaskStatus::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "approved" => Some(TaskStatus::Approved),
            "declined" => Some(TaskStatus::Declined),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Pending, TaskStatus::Approved) | (TaskStatus::Pending, TaskStatus::Declined)
        )
    }
}

/// Columns tasks can be counted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCountField {
    Platform,
    Goal,
    TaskType,
    TargetCountry,
    Gender,
}

impl TaskCountField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "platform" => Some(TaskCountField::Platform),
            "goal" => Some(TaskCountField::Goal),
            "task_type" => Some(TaskCountField::TaskType),
            "target_country" => Some(TaskCountField::TargetCountry),
            "gender" => Some(TaskCountField::Gender),
            _ => None,
        }
    }

    /// Column name; only ever one of the fixed identifiers above
    fn column(&self) -> &'static str {
        match self {
            TaskCountField::Platform => "platform",
            TaskCountField::Goal => "goal",
            TaskCountField::TaskType => "task_type::TEXT",
            TaskCountField::TargetCountry => "target_country",
            TaskCountField::Gender => "gender",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Public 20-character alphanumeric key
    pub task_key: String,

    pub creator_id: Uuid,
    pub task_type: TaskType,

    /// Lowercased platform name, e.g. `instagram`
    pub platform: String,

    /// Total fee paid by the creator, minor units
    pub fee: i64,

    pub status: TaskStatus,
    pub payment_status: PaymentStatus,
    pub total_allocated: i32,
    pub total_success: i32,

    // Advert fields
    pub posts_count: i32,
    pub target_country: Option<String>,
    pub target_state: Option<String>,
    pub gender: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<String>,

    // Engagement fields
    pub goal: Option<String>,
    pub account_link: Option<String>,
    pub engagements_count: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Number of performances the creator paid for
    pub fn target(&self) -> i32 {
        match self.task_type {
            TaskType::Advert => self.posts_count,
            TaskType::Engagement => self.engagements_count,
        }
    }

    /// Reward paid for one accepted performance: the fee split evenly across the target
    pub fn reward_per_slot(&self) -> i64 {
        let target = i64::from(self.target());
        if target <= 0 {
            return 0;
        }
        self.fee / target
    }

    pub fn is_available(&self) -> bool {
        self.status == TaskStatus::Approved && self.payment_status == PaymentStatus::Complete
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTask {
    pub creator_id: Uuid,
    pub task_type: TaskType,
    pub platform: String,
    pub fee: i64,
    pub posts_count: i32,
    pub target_country: Option<String>,
    pub target_state: Option<String>,
    pub gender: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<String>,
    pub goal: Option<String>,
    pub account_link: Option<String>,
    pub engagements_count: i32,
}

/// Filters for the public task listing
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub task_type: Option<TaskType>,
    pub platform: Option<String>,
    pub goal: Option<String>,
}

impl Task {
    /// Inserts a task with a fresh `task_key`, unreviewed and unpaid
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateTask,
    ) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (task_key, creator_id, task_type, platform, fee,
                               posts_count, target_country, target_state, gender, caption, hashtags,
                               goal, account_link, engagements_count)
            VALUES ($1, $2, $3, LOWER($4), $5, $6, $7, $8, $9, $10, $11, LOWER($12), $13, $14)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(crate::reference::task_key())
        .bind(data.creator_id)
        .bind(data.task_type)
        .bind(data.platform)
        .bind(data.fee)
        .bind(data.posts_count)
        .bind(data.target_country)
        .bind(data.target_state)
        .bind(data.gender)
        .bind(data.caption)
        .bind(data.hashtags)
        .bind(data.goal)
        .bind(data.account_link)
        .bind(data.engagements_count)
        .fetch_one(executor)
        .await?;

        tracing::debug!(task_id = %task.id, task_key = %task.task_key, "created task");
        Ok(task)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_key(pool: &PgPool, task_key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_key = $1"))
            .bind(task_key)
            .fetch_optional(pool)
            .await
    }

    /// Looks a task up by UUID when the value parses as one, otherwise by `task_key`
    pub async fn find_by_id_or_key(pool: &PgPool, id_or_key: &str) -> Result<Option<Self>, sqlx::Error> {
        match Uuid::parse_str(id_or_key) {
            Ok(id) => Self::find_by_id(pool, id).await,
            Err(_) => Self::find_by_key(pool, id_or_key).await,
        }
    }

    /// Loads a task and holds a row lock until the transaction ends
    pub async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn lock_by_key(
        tx: &mut Transaction<'_, Postgres>,
        task_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_key = $1 FOR UPDATE"
        ))
        .bind(task_key)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Moves `payment_status` away from `pending`
    ///
    /// Returns `None` if the task's payment was already settled.
    pub async fn settle_payment_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks SET payment_status = $2, updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payment_status)
        .fetch_optional(executor)
        .await
    }

    /// Applies a review decision to a pending task
    ///
    /// Returns `None` if the task is not pending.
    pub async fn review<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await
    }

    /// Hands out one slot
    pub async fn allocate_slot<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET total_allocated = total_allocated + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Returns a slot that will not be completed
    pub async fn release_slot<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks SET total_allocated = GREATEST(total_allocated - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Records an accepted performance
    pub async fn record_success<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks SET total_success = total_success + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Lists approved, paid tasks, newest first
    pub async fn list_available(
        pool: &PgPool,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE status = 'approved' AND payment_status = 'complete'
              AND ($1::task_type IS NULL OR task_type = $1)
              AND ($2::TEXT IS NULL OR platform = LOWER($2))
              AND ($3::TEXT IS NULL OR goal = LOWER($3))
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.task_type)
        .bind(filter.platform.as_deref())
        .bind(filter.goal.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_available(pool: &PgPool, filter: &TaskFilter) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM tasks
            WHERE status = 'approved' AND payment_status = 'complete'
              AND ($1::task_type IS NULL OR task_type = $1)
              AND ($2::TEXT IS NULL OR platform = LOWER($2))
              AND ($3::TEXT IS NULL OR goal = LOWER($3))
            "#,
        )
        .bind(filter.task_type)
        .bind(filter.platform.as_deref())
        .bind(filter.goal.as_deref())
        .fetch_one(pool)
        .await
    }

    /// Counts approved, paid tasks grouped by a column
    ///
    /// Rows where the column is NULL are grouped under `None`.
    pub async fn counts_by(
        pool: &PgPool,
        field: TaskCountField,
    ) -> Result<Vec<(Option<String>, i64)>, sqlx::Error> {
        let column = field.column();
        sqlx::query_as::<_, (Option<String>, i64)>(&format!(
            r#"
            SELECT {column} AS value, COUNT(*) AS total FROM tasks
            WHERE status = 'approved' AND payment_status = 'complete'
            GROUP BY value
            ORDER BY total DESC, value
            "#
        ))
        .fetch_all(pool)
        .await
    }

    /// Lists tasks created by a user, optionally filtered by review status
    pub async fn list_by_creator(
        pool: &PgPool,
        creator_id: Uuid,
        status: Option<TaskStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE creator_id = $1 AND ($2::task_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(creator_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_creator(
        pool: &PgPool,
        creator_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE creator_id = $1 AND ($2::task_status IS NULL OR status = $2)",
        )
        .bind(creator_id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Lists all tasks for review (admin), optionally filtered by status
    pub async fn list_all(
        pool: &PgPool,
        status: Option<TaskStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE ($1::task_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_all(pool: &PgPool, status: Option<TaskStatus>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE ($1::task_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Task totals per review status (admin dashboard)
    pub async fn count_per_status(pool: &PgPool) -> Result<Vec<(TaskStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (TaskStatus, i64)>(
            "SELECT status, COUNT(*) FROM tasks GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await
    }
}
