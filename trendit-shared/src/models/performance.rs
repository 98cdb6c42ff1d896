//! Task performance model
//!
//! One row per (performer, task) attempt.
//!
//! # State Machine
//!
//! ```text
//! pending → in_review → accepted
//!                     → rejected
//! pending → cancelled          (performer gave up)
//! pending → failed             (timed out, see the worker's expiry job)
//! ```
//!
//! A user holds at most one `pending` performance (`idx_performances_one_pending`) and
//! performs a given task at most once (`UNIQUE (user_id, task_id)`).
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE performance_status AS ENUM
//!     ('pending', 'in_review', 'accepted', 'rejected', 'failed', 'cancelled');
//!
//! CREATE TABLE task_performances (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
//!     task_type task_type NOT NULL,
//!     reward_money BIGINT NOT NULL DEFAULT 0,
//!     account_name VARCHAR(255) NOT NULL DEFAULT '',
//!     proof_screenshot_url TEXT,
//!     status performance_status NOT NULL DEFAULT 'pending',
//!     started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     submitted_at TIMESTAMPTZ,
//!     reviewed_at TIMESTAMPTZ,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (user_id, task_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::task::TaskType;

const PERFORMANCE_COLUMNS: &str = "id, user_id, task_id, task_type, reward_money, account_name, \
     proof_screenshot_url, status, started_at, submitted_at, reviewed_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "performance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PerformanceStatus {
    /// Slot allocated, proof not yet submitted
    Pending,
    InReview,
    Accepted,
    Rejected,
    /// Timed out before proof was submitted
    Failed,
    Cancelled,
}

impl PerformanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceStatus::Pending => "pending",
            PerformanceStatus::InReview => "in_review",
            PerformanceStatus::Accepted => "accepted",
            PerformanceStatus::Rejected => "rejected",
            PerformanceStatus::Failed => "failed",
            PerformanceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PerformanceStatus::Pending),
            "in_review" => Some(PerformanceStatus::InReview),
            "accepted" => Some(PerformanceStatus::Accepted),
            "rejected" => Some(PerformanceStatus::Rejected),
            "failed" => Some(PerformanceStatus::Failed),
            "cancelled" => Some(PerformanceStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PerformanceStatus::Accepted
                | PerformanceStatus::Rejected
                | PerformanceStatus::Failed
                | PerformanceStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, target: PerformanceStatus) -> bool {
        use PerformanceStatus::*;
        matches!(
            (self, target),
            (Pending, InReview)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (InReview, Accepted)
                | (InReview, Rejected)
        )
    }

    /// Whether the performer may still edit their submission
    pub fn is_editable(&self) -> bool {
        matches!(self, PerformanceStatus::Pending | PerformanceStatus::InReview)
    }

    /// Whether the performer may delete the record
    pub fn is_deletable(&self) -> bool {
        matches!(
            self,
            PerformanceStatus::Pending | PerformanceStatus::Cancelled | PerformanceStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskPerformance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub task_type: TaskType,

    /// Credited on acceptance, minor units
    pub reward_money: i64,

    /// Social account the performer used
    pub account_name: String,
    pub proof_screenshot_url: Option<String>,
    pub status: PerformanceStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Proof fields a performer may edit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProof {
    pub account_name: Option<String>,
    pub proof_screenshot_url: Option<String>,
}

impl TaskPerformance {
    /// Opens a pending performance
    pub async fn create_pending<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        task_id: Uuid,
        task_type: TaskType,
        reward_money: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            r#"
            INSERT INTO task_performances (user_id, task_id, task_type, reward_money)
            VALUES ($1, $2, $3, $4)
            RETURNING {PERFORMANCE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(task_id)
        .bind(task_type)
        .bind(reward_money)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM task_performances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a performance owned by `user_id`
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM task_performances WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_pending_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM task_performances WHERE user_id = $1 AND status = 'pending'"
        ))
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_user_and_task<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM task_performances WHERE user_id = $1 AND task_id = $2"
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(executor)
        .await
    }

    /// Loads a performance and holds a row lock until the transaction ends
    pub async fn lock_by_id(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM task_performances WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Submits proof for a pending performance (pending → in_review)
    ///
    /// Returns `None` if the performance is not pending.
    pub async fn submit<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        account_name: &str,
        proof_screenshot_url: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            r#"
            UPDATE task_performances
            SET status = 'in_review',
                account_name = $2,
                proof_screenshot_url = $3,
                submitted_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {PERFORMANCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(account_name)
        .bind(proof_screenshot_url)
        .fetch_optional(executor)
        .await
    }

    /// Edits proof while the performance is pending or in review
    pub async fn update_proof(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateProof,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE task_performances SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.account_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", account_name = ${}", bind_count));
        }
        if data.proof_screenshot_url.is_some() {
            bind_count += 1;
            query.push_str(&format!(", proof_screenshot_url = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'in_review') RETURNING {PERFORMANCE_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, TaskPerformance>(&query).bind(id).bind(user_id);
        if let Some(account_name) = data.account_name {
            q = q.bind(account_name);
        }
        if let Some(url) = data.proof_screenshot_url {
            q = q.bind(url);
        }

        q.fetch_optional(pool).await
    }

    /// Moves a performance between statuses if it is currently in `from`
    ///
    /// Sets `reviewed_at` when the target is accepted or rejected. Returns `None` when
    /// the row was not in `from`.
    pub async fn transition<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        from: PerformanceStatus,
        to: PerformanceStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            r#"
            UPDATE task_performances
            SET status = $3,
                reviewed_at = CASE WHEN $3 IN ('accepted'::performance_status, 'rejected'::performance_status)
                                   THEN NOW() ELSE reviewed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {PERFORMANCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_performances WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fails pending performances started before `started_before`
    ///
    /// Claims at most `limit` rows with `FOR UPDATE SKIP LOCKED`, so concurrent sweepers
    /// and in-flight submissions never block each other. Returns the expired rows.
    pub async fn expire_stale(
        tx: &mut Transaction<'_, Postgres>,
        started_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(
            r#"
            WITH stale AS (
                SELECT id FROM task_performances
                WHERE status = 'pending' AND started_at < $1
                ORDER BY started_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE task_performances p
            SET status = 'failed', updated_at = NOW()
            FROM stale
            WHERE p.id = stale.id
            RETURNING p.id, p.user_id, p.task_id, p.task_type, p.reward_money, p.account_name,
                      p.proof_screenshot_url, p.status, p.started_at, p.submitted_at,
                      p.reviewed_at, p.updated_at
            "#
        )
        .bind(started_before)
        .bind(limit)
        .fetch_all(&mut **tx)
        .await
    }

    /// Lists a user's performances, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<PerformanceStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            r#"
            SELECT {PERFORMANCE_COLUMNS} FROM task_performances
            WHERE user_id = $1 AND ($2::performance_status IS NULL OR status = $2)
            ORDER BY started_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<PerformanceStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM task_performances
            WHERE user_id = $1 AND ($2::performance_status IS NULL OR status = $2)
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Lists every performance (admin), oldest submission first so reviews are FIFO
    pub async fn list_all(
        pool: &PgPool,
        status: Option<PerformanceStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskPerformance>(&format!(
            r#"
            SELECT {PERFORMANCE_COLUMNS} FROM task_performances
            WHERE ($1::performance_status IS NULL OR status = $1)
            ORDER BY submitted_at ASC NULLS LAST, started_at ASC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_all(
        pool: &PgPool,
        status: Option<PerformanceStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM task_performances WHERE ($1::performance_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// A user's performance totals per status
    pub async fn count_per_status(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<(PerformanceStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (PerformanceStatus, i64)>(
            r#"
            SELECT status, COUNT(*) FROM task_performances
            WHERE user_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Sum of rewards for accepted performances, optionally since an instant
    pub async fn total_earned(
        pool: &PgPool,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(reward_money), 0)::BIGINT FROM task_performances
            WHERE user_id = $1
              AND status = 'accepted'
              AND ($2::timestamptz IS NULL OR reviewed_at >= $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Rewards paid out across the platform (admin dashboard)
    pub async fn total_rewards_paid(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(reward_money), 0)::BIGINT FROM task_performances WHERE status = 'accepted'",
        )
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_parse() {
        for status in [
            PerformanceStatus::Pending,
            PerformanceStatus::InReview,
            PerformanceStatus::Accepted,
            PerformanceStatus::Rejected,
            PerformanceStatus::Failed,
            PerformanceStatus::Cancelled,
        ] {
            assert_eq!(PerformanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PerformanceStatus::parse("timed_out"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PerformanceStatus::InReview).unwrap(),
            "\"in_review\""
        );
    }

    #[test]
    fn test_transitions() {
        use PerformanceStatus::*;

        assert!(Pending.can_transition_to(InReview));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(InReview.can_transition_to(Accepted));
        assert!(InReview.can_transition_to(Rejected));

        assert!(!Pending.can_transition_to(Accepted));
        assert!(!InReview.can_transition_to(Cancelled));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Failed.can_transition_to(InReview));
    }

    #[test]
    fn test_edit_and_delete_rules() {
        use PerformanceStatus::*;

        assert!(Pending.is_editable());
        assert!(InReview.is_editable());
        assert!(!Accepted.is_editable());

        assert!(Pending.is_deletable());
        assert!(Cancelled.is_deletable());
        assert!(Failed.is_deletable());
        assert!(!InReview.is_deletable());
        assert!(!Accepted.is_deletable());
        assert!(!Rejected.is_deletable());

        assert!(Rejected.is_terminal());
        assert!(!InReview.is_terminal());
    }
}
