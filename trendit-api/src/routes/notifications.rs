//! Inbox
//!
//! - `GET  /v1/notifications?kind=message|notification|activity`
//! - `POST /v1/notifications/:id/read`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
};
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use trendit_shared::{
    auth::middleware::AuthContext,
    models::notification::{Notification, NotificationKind},
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub kind: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<ApiResponse> {
    let kind = match query.kind.as_deref() {
        None => None,
        Some(kind) => Some(
            NotificationKind::parse(kind)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid notification kind: {}", kind)))?,
        ),
    };

    let notifications =
        Notification::list_for_recipient(&state.db, auth.user_id, kind, page.limit(), page.offset()).await?;
    let total = Notification::count_for_recipient(&state.db, auth.user_id, kind).await?;

    Ok(ApiResponse::ok("Notifications fetched successfully").paginated(
        "notifications",
        notifications,
        &page,
        total,
    ))
}

/// Marks a notification read. Someone else's notification is a 404.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let notification = Notification::mark_read(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(ApiResponse::ok("Notification marked as read").with("notification", notification))
}
