//! In-app notifications
//!
//! Three kinds share one table: direct `message`s (admin → user), system
//! `notification`s, and `activity` entries (task accepted, payment received, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Notification,
    Activity,
}

impl NotificationKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "message" => Some(NotificationKind::Message),
            "notification" => Some(NotificationKind::Notification),
            "activity" => Some(NotificationKind::Activity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        recipient_id: Uuid,
        sender_id: Option<Uuid>,
        kind: NotificationKind,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, sender_id, kind, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipient_id, sender_id, kind, body, read_at, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(sender_id)
        .bind(kind)
        .bind(body)
        .fetch_one(executor)
        .await
    }

    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient_id: Uuid,
        kind: Option<NotificationKind>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, sender_id, kind, body, read_at, created_at
            FROM notifications
            WHERE recipient_id = $1 AND ($2::notification_kind IS NULL OR kind = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(recipient_id)
        .bind(kind)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_recipient(
        pool: &PgPool,
        recipient_id: Uuid,
        kind: Option<NotificationKind>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1 AND ($2::notification_kind IS NULL OR kind = $2)
            "#,
        )
        .bind(recipient_id)
        .bind(kind)
        .fetch_one(pool)
        .await
    }

    /// Marks a notification read. Reading twice keeps the first `read_at`.
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND recipient_id = $2
            RETURNING id, recipient_id, sender_id, kind, body, read_at, created_at
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
    }
}
