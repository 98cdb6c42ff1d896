//! Performing tasks
//!
//! # Endpoints
//!
//! - `POST   /v1/generate-task` - get a random matching task to perform
//! - `POST   /v1/perform-task` - submit proof for it
//! - `GET    /v1/performed-tasks` - the caller's performances
//! - `GET    /v1/performed-tasks/status/:status`
//! - `GET    /v1/performed-tasks/:id`
//! - `PUT    /v1/performed-tasks/:id` - edit proof while pending or in review
//! - `POST   /v1/performed-tasks/:id/cancel` - give up a pending performance
//! - `DELETE /v1/performed-tasks/:id` - delete a pending, cancelled or failed one
//!
//! Another user's performance is reported as 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use trendit_shared::{
    assignment::{self, TaskCriteria},
    auth::middleware::AuthContext,
    models::performance::{PerformanceStatus, TaskPerformance, UpdateProof},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct GenerateTaskRequest {
    /// `advert` or `engagement`
    pub task_type: String,
    pub platform: Option<String>,
    pub goal: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PerformTaskRequest {
    /// Task UUID or task key
    #[validate(length(min = 1, message = "Task id or key is required"))]
    pub task_id_key: String,

    #[validate(length(min = 1, max = 100, message = "Account name is required"))]
    pub account_name: String,

    #[validate(url(message = "Proof screenshot must be a URL"))]
    pub proof_screenshot_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePerformanceRequest {
    #[validate(length(min = 1, max = 100, message = "Account name cannot be empty"))]
    pub account_name: Option<String>,

    #[validate(url(message = "Proof screenshot must be a URL"))]
    pub proof_screenshot_url: Option<String>,
}

fn generated_message(criteria: &TaskCriteria) -> String {
    match criteria {
        TaskCriteria::Advert { platform } => format!("An Advert task for {} generated successfully.", platform),
        TaskCriteria::Engagement { goal } => format!("An Engagement task for {} generated successfully.", goal),
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Task performance not found".to_string())
}

/// Allocates a task to the caller
///
/// # Errors
///
/// - `409 Conflict`: the caller still has a pending task
/// - `206 Partial Content`: no matching task is available
/// - `400 Bad Request`: unknown task type, or missing platform/goal
pub async fn generate_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<GenerateTaskRequest>,
) -> ApiResult<ApiResponse> {
    let criteria = TaskCriteria::parse(&req.task_type, req.platform.as_deref(), req.goal.as_deref())?;

    let generated = assignment::generate_task(&state.db, auth.user_id, &criteria).await?;

    Ok(ApiResponse::ok(generated_message(&criteria)).with("generated_task", generated))
}

/// Submits proof for an allocated task
///
/// # Errors
///
/// - `404 Not Found`: unknown task, or no pending performance for it
/// - `409 Conflict`: the caller already submitted this task
pub async fn perform_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PerformTaskRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let performed = assignment::submit_proof(
        &state.db,
        auth.user_id,
        req.task_id_key.trim(),
        req.account_name.trim(),
        req.proof_screenshot_url.trim(),
    )
    .await?;

    Ok(ApiResponse::created("Task Performed successfully").with("performed_task", performed))
}

pub async fn list_performances(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let performances =
        TaskPerformance::list_by_user(&state.db, auth.user_id, None, page.limit(), page.offset()).await?;
    let total = TaskPerformance::count_by_user(&state.db, auth.user_id, None).await?;

    Ok(ApiResponse::ok("Performed tasks fetched successfully").paginated(
        "performed_tasks",
        performances,
        &page,
        total,
    ))
}

pub async fn list_performances_by_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(status): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let status = PerformanceStatus::parse(&status)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid performance status: {}", status)))?;

    let performances =
        TaskPerformance::list_by_user(&state.db, auth.user_id, Some(status), page.limit(), page.offset())
            .await?;
    let total = TaskPerformance::count_by_user(&state.db, auth.user_id, Some(status)).await?;

    Ok(ApiResponse::ok(format!("{} performed tasks fetched successfully", status.as_str())).paginated(
        "performed_tasks",
        performances,
        &page,
        total,
    ))
}

pub async fn get_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let performance = TaskPerformance::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok("Performed task fetched successfully").with("performed_task", performance))
}

/// Edits proof
///
/// # Errors
///
/// - `409 Conflict`: the performance was already reviewed, cancelled or expired
pub async fn update_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePerformanceRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let updated = TaskPerformance::update_proof(
        &state.db,
        id,
        auth.user_id,
        UpdateProof {
            account_name: req.account_name,
            proof_screenshot_url: req.proof_screenshot_url,
        },
    )
    .await?;

    match updated {
        Some(performance) => {
            Ok(ApiResponse::ok("Performed task updated successfully").with("performed_task", performance))
        }
        None => {
            let existing = TaskPerformance::find_for_user(&state.db, id, auth.user_id)
                .await?
                .ok_or_else(not_found)?;
            Err(ApiError::Conflict(format!(
                "Task performance is {} and can no longer be edited",
                existing.status.as_str()
            )))
        }
    }
}

pub async fn cancel_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    let cancelled = assignment::cancel_performance(&state.db, auth.user_id, id).await?;

    Ok(ApiResponse::ok("Task performance cancelled").with("performed_task", cancelled))
}

pub async fn delete_performance(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    assignment::delete_performance(&state.db, auth.user_id, id).await?;

    Ok(ApiResponse::ok("Performed task deleted successfully"))
}
