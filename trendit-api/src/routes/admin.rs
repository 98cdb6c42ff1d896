//! Admin endpoints under `/v1/admin`
//!
//! Every route here sits behind `admin_layer`, so handlers can assume the caller
//! holds the admin role. Review decisions go through `trendit_shared::review`, the
//! same code the Telegram buttons use.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
    routes::tasks::{parse_task_status, StatusQuery},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use trendit_shared::{
    auth::middleware::AuthContext,
    models::{
        notification::{Notification, NotificationKind},
        payment::Payment,
        performance::{PerformanceStatus, TaskPerformance},
        social::{SocialVerification, VerificationStatus},
        task::Task,
        transaction::LedgerEntry,
        user::User,
        wallet::Wallet,
        withdrawal::Withdrawal,
    },
    review, social,
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,

    #[validate(length(min = 1, max = 2000, message = "Message body is required"))]
    pub body: String,
}

fn task_not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

/// Platform totals
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<ApiResponse> {
    let users = User::count(&state.db).await?;

    let tasks: Map<String, JsonValue> = Task::count_per_status(&state.db)
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), JsonValue::from(count)))
        .collect();

    let payments_received = Payment::total_received(&state.db).await?;
    let withdrawals_paid = Withdrawal::total_completed(&state.db).await?;
    let rewards_paid = TaskPerformance::total_rewards_paid(&state.db).await?;
    let wallet_balances = Wallet::total_balance(&state.db).await?;

    Ok(ApiResponse::ok("Dashboard fetched successfully")
        .with("total_users", users)
        .with("tasks", tasks)
        .with("payments_received", payments_received)
        .with("withdrawals_paid", withdrawals_paid)
        .with("rewards_paid", rewards_paid)
        .with("wallet_balances", wallet_balances))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<ApiResponse> {
    let status = parse_task_status(query.status.as_deref())?;

    let tasks = Task::list_all(&state.db, status, page.limit(), page.offset()).await?;
    let total = Task::count_all(&state.db, status).await?;

    Ok(ApiResponse::ok("Tasks fetched successfully").paginated("tasks", tasks, &page, total))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let task = Task::find_by_id(&state.db, id).await?.ok_or_else(task_not_found)?;

    Ok(ApiResponse::ok("Task fetched successfully").with("task", task))
}

/// # Errors
///
/// - `409 Conflict`: the task was already reviewed
pub async fn approve_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let task = review::approve_task(&state.db, id, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Task approved").with("task", task))
}

/// Declines a task; a paid task's fee goes back to the advertiser's wallet
pub async fn reject_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let task = review::reject_task(&state.db, id, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Task declined").with("task", task))
}

#[derive(Debug, Deserialize)]
pub struct PerformanceStatusQuery {
    pub status: Option<String>,
}

pub async fn list_performances(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<PerformanceStatusQuery>,
) -> ApiResult<ApiResponse> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            PerformanceStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid performance status: {}", s)))?,
        ),
    };

    let performances = TaskPerformance::list_all(&state.db, status, page.limit(), page.offset()).await?;
    let total = TaskPerformance::count_all(&state.db, status).await?;

    Ok(ApiResponse::ok("Performed tasks fetched successfully").paginated(
        "performed_tasks",
        performances,
        &page,
        total,
    ))
}

pub async fn get_performance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let performance = TaskPerformance::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task performance not found".to_string()))?;

    Ok(ApiResponse::ok("Performed task fetched successfully").with("performed_task", performance))
}

/// Accepts a submission and pays its reward
pub async fn accept_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let performance = review::accept_performance(&state.db, id, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Performed task accepted").with("performed_task", performance))
}

pub async fn reject_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let performance = review::reject_performance(&state.db, id, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Performed task rejected").with("performed_task", performance))
}

pub async fn list_social_verifications(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<ApiResponse> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            VerificationStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid verification status: {}", s)))?,
        ),
    };

    let requests = SocialVerification::list(&state.db, status, page.limit(), page.offset()).await?;
    let total = SocialVerification::count(&state.db, status).await?;

    Ok(ApiResponse::ok("Social verification requests fetched successfully").paginated(
        "social_verification_requests",
        requests,
        &page,
        total,
    ))
}

/// Marks the linked profile verified
///
/// - `409 Conflict`: the request was already decided
pub async fn approve_social_verification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let request = social::decide_verification(&state.db, id, VerificationStatus::Approved, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Social verification request approved").with("social_verification", request))
}

pub async fn reject_social_verification(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let request = social::decide_verification(&state.db, id, VerificationStatus::Rejected, Some(auth.user_id)).await?;

    Ok(ApiResponse::ok("Social verification request rejected").with("social_verification", request))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let users = User::list(&state.db, page.limit(), page.offset()).await?;
    let total = User::count(&state.db).await?;

    Ok(ApiResponse::ok("Users fetched successfully").paginated("users", users, &page, total))
}

/// Every ledger entry, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let entries = LedgerEntry::list_all(&state.db, page.limit(), page.offset()).await?;
    let total = LedgerEntry::count_all(&state.db).await?;

    Ok(ApiResponse::ok("Transactions fetched successfully").paginated("transactions", entries, &page, total))
}

/// Drops a message into a user's inbox
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    User::find_by_id(&state.db, req.recipient_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Recipient not found".to_string()))?;

    let message = Notification::create(
        &state.db,
        req.recipient_id,
        Some(auth.user_id),
        NotificationKind::Message,
        req.body.trim(),
    )
    .await?;

    tracing::info!(sender = %auth.user_id, recipient = %req.recipient_id, "Admin message sent");

    Ok(ApiResponse::created("Message sent").with("message", message))
}
