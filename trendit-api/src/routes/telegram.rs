//! Telegram bot webhook
//!
//! `POST /v1/telegram/webhook`
//!
//! Paid tasks are posted to the admin chat with Approve/Reject buttons. Pressing one
//! delivers a `callback_query` here, which is applied through the same review code as
//! the admin API. Telegram retries anything that is not a 2xx, so every update that
//! passes the secret check is acknowledged even when the review itself fails.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use trendit_shared::{
    payments::constant_time_eq,
    review::{self, ReviewError},
    telegram::{parse_callback, CallbackAction, SECRET_TOKEN_HEADER},
};

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
}

/// With no secret configured nothing is accepted
fn secret_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let (Some(expected), Some(received)) = (expected, headers.get(SECRET_TOKEN_HEADER)) else {
        return false;
    };
    constant_time_eq(received.as_bytes(), expected.as_bytes())
}

fn review_reply(action: CallbackAction, result: &Result<(), ReviewError>) -> String {
    match (action, result) {
        (CallbackAction::Approve(_), Ok(())) => "Task approved".to_string(),
        (CallbackAction::Reject(_), Ok(())) => "Task declined".to_string(),
        (_, Err(ReviewError::TaskNotFound)) => "Task not found".to_string(),
        (_, Err(ReviewError::InvalidState(status))) => format!("Task already {}", status),
        (_, Err(_)) => "Could not review task, try again".to_string(),
    }
}

/// # Errors
///
/// - `503 Service Unavailable`: the bot is not configured
/// - `401 Unauthorized`: no secret is configured, or the header is missing or wrong
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> ApiResult<ApiResponse> {
    let notifier = state
        .telegram
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Telegram bot is not configured".to_string()))?;

    if !secret_matches(notifier.config().webhook_secret.as_deref(), &headers) {
        tracing::warn!(update_id = update.update_id, "Rejected Telegram update with bad secret");
        return Err(ApiError::Unauthorized("Invalid Telegram secret token".to_string()));
    }

    let Some(callback) = update.callback_query else {
        return Ok(ApiResponse::ok("Update ignored"));
    };

    let Some(action) = callback.data.as_deref().and_then(parse_callback) else {
        tracing::debug!(update_id = update.update_id, "Ignoring unknown callback data");
        return Ok(ApiResponse::ok("Update ignored"));
    };

    let result = match action {
        CallbackAction::Approve(id) => review::approve_task(&state.db, id, None).await.map(|_| ()),
        CallbackAction::Reject(id) => review::reject_task(&state.db, id, None).await.map(|_| ()),
    };

    if let Err(e) = &result {
        tracing::warn!(task_id = %action.task_id(), error = %e, "Telegram review failed");
    }

    let reply = review_reply(action, &result);
    if let Err(e) = notifier.answer_callback(&callback.id, &reply).await {
        tracing::warn!(error = %e, "Failed to answer Telegram callback");
    }

    Ok(ApiResponse::ok(reply).with("reviewed", result.is_ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_review_reply() {
        let id = Uuid::new_v4();
        assert_eq!(review_reply(CallbackAction::Approve(id), &Ok(())), "Task approved");
        assert_eq!(review_reply(CallbackAction::Reject(id), &Ok(())), "Task declined");
        assert_eq!(
            review_reply(CallbackAction::Approve(id), &Err(ReviewError::InvalidState("approved"))),
            "Task already approved"
        );
        assert_eq!(
            review_reply(CallbackAction::Reject(id), &Err(ReviewError::TaskNotFound)),
            "Task not found"
        );
    }

    #[test]
    fn test_secret_matches() {
        let mut headers = HeaderMap::new();
        assert!(!secret_matches(None, &headers));
        assert!(!secret_matches(Some("s3cret"), &headers));

        headers.insert(SECRET_TOKEN_HEADER, "wrong".parse().unwrap());
        assert!(!secret_matches(Some("s3cret"), &headers));

        headers.insert(SECRET_TOKEN_HEADER, "s3cret".parse().unwrap());
        assert!(secret_matches(Some("s3cret"), &headers));
        assert!(!secret_matches(None, &headers));
    }

    #[test]
    fn test_update_deserializes_without_callback() {
        let update: Update = serde_json::from_str(r#"{"update_id": 7, "message": {"text": "hi"}}"#).unwrap();
        assert_eq!(update.update_id, 7);
        assert!(update.callback_query.is_none());
    }
}
