//! Task creation and listing
//!
//! # Endpoints
//!
//! - `POST /v1/tasks` - create a task, paid from the wallet or through the gateway
//! - `GET  /v1/tasks` - approved, paid tasks (`task_type`, `platform`, `goal` filters)
//! - `GET  /v1/tasks/:id_or_key` - one task by UUID or task key
//! - `GET  /v1/tasks/counts/:field` - available task counts grouped by a column
//! - `GET  /v1/current-user/tasks` - tasks created by the caller
//!
//! # Paying for a task
//!
//! With `payment_method = "trendit_wallet"` the task row, the wallet debit, the payment
//! record and the paid flag are written in one transaction: either the task exists and
//! is paid, or nothing was written. With `"payment_gateway"` the task is stored unpaid and
//! a checkout is started; settlement marks it paid later.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    response::{ApiResponse, PageQuery},
    routes::payments::start_gateway_payment,
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use trendit_shared::{
    auth::{authorization, middleware::AuthContext},
    models::{
        payment::{CreatePayment, Payment, PaymentMethod, PaymentStatus, PaymentType},
        task::{CreateTask, Task, TaskCountField, TaskFilter, TaskStatus, TaskType},
        user::{User, UserRole},
    },
    reference, wallet,
};

/// Header carrying the page the gateway returns the payer to
pub const CALLBACK_URL_HEADER: &str = "callback-url";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskPaymentChoice {
    Wallet,
    Gateway,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub task_type: String,
    pub platform: String,

    /// Minor units
    pub fee: i64,

    /// `trendit_wallet` or `payment_gateway`
    pub payment_method: String,

    pub posts_count: Option<i32>,
    pub target_country: Option<String>,
    pub target_state: Option<String>,
    pub gender: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Option<String>,

    pub goal: Option<String>,
    pub account_link: Option<String>,
    pub engagements_count: Option<i32>,
}

impl CreateTaskRequest {
    /// Checks the per-type rules and builds the insert
    fn into_create(self, creator_id: uuid::Uuid) -> Result<(CreateTask, TaskPaymentChoice), ApiError> {
        let mut errors = Vec::new();

        let task_type = TaskType::parse(&self.task_type);
        if task_type.is_none() {
            errors.push(ValidationErrorDetail::new("task_type", "Task type must be advert or engagement"));
        }

        let choice = match self.payment_method.as_str() {
            "trendit_wallet" => Some(TaskPaymentChoice::Wallet),
            "payment_gateway" => Some(TaskPaymentChoice::Gateway),
            _ => {
                errors.push(ValidationErrorDetail::new(
                    "payment_method",
                    "Payment method must be trendit_wallet or payment_gateway",
                ));
                None
            }
        };

        if self.platform.trim().is_empty() {
            errors.push(ValidationErrorDetail::new("platform", "Platform is required"));
        }
        if self.fee <= 0 {
            errors.push(ValidationErrorDetail::new("fee", "Fee must be greater than zero"));
        }

        let posts_count = self.posts_count.unwrap_or(0);
        let engagements_count = self.engagements_count.unwrap_or(0);
        let goal = self.goal.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());

        match task_type {
            Some(TaskType::Advert) if posts_count <= 0 => {
                errors.push(ValidationErrorDetail::new("posts_count", "Advert tasks need at least one post"));
            }
            Some(TaskType::Engagement) => {
                if goal.is_none() {
                    errors.push(ValidationErrorDetail::new("goal", "Engagement tasks need a goal"));
                }
                if engagements_count <= 0 {
                    errors.push(ValidationErrorDetail::new(
                        "engagements_count",
                        "Engagement tasks need at least one engagement",
                    ));
                }
            }
            _ => {}
        }

        match (task_type, choice) {
            (Some(task_type), Some(choice)) if errors.is_empty() => Ok((
                CreateTask {
                    creator_id,
                    task_type,
                    platform: self.platform.trim().to_string(),
                    fee: self.fee,
                    posts_count: if task_type == TaskType::Advert { posts_count } else { 0 },
                    target_country: self.target_country,
                    target_state: self.target_state,
                    gender: self.gender,
                    caption: self.caption,
                    hashtags: self.hashtags,
                    goal,
                    account_link: self.account_link,
                    engagements_count: if task_type == TaskType::Engagement {
                        engagements_count
                    } else {
                        0
                    },
                },
                choice,
            )),
            _ => Err(ApiError::ValidationError(errors)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub task_type: Option<String>,
    pub platform: Option<String>,
    pub goal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskCount {
    pub value: Option<String>,
    pub total: i64,
}

pub(crate) fn parse_task_status(status: Option<&str>) -> ApiResult<Option<TaskStatus>> {
    status
        .map(|s| TaskStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("Invalid task status: {}", s))))
        .transpose()
}

/// Creates a task
///
/// # Errors
///
/// - `422`: invalid task fields
/// - `400`: insufficient wallet balance, or `CALLBACK-URL` missing for a gateway payment
/// - `502`: the gateway refused to start the checkout
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<ApiResponse> {
    let (data, choice) = req.into_create(auth.user_id)?;

    match choice {
        TaskPaymentChoice::Wallet => create_task_from_wallet(&state, auth, data).await,
        TaskPaymentChoice::Gateway => {
            let callback_url = headers
                .get(CALLBACK_URL_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::BadRequest("CALLBACK-URL header is required".to_string()))?
                .to_string();

            create_task_from_gateway(&state, auth, data, callback_url).await
        }
    }
}

async fn create_task_from_wallet(state: &AppState, auth: AuthContext, data: CreateTask) -> ApiResult<ApiResponse> {
    let fee = data.fee;
    let payment_reference = reference::payment_reference();

    let mut tx = state.db.begin().await?;

    let task = Task::create(&mut *tx, data).await?;

    let debited = wallet::debit(
        &mut tx,
        auth.user_id,
        fee,
        &payment_reference,
        &format!("Payment for task {}", task.task_key),
    )
    .await?;

    Payment::create(
        &mut *tx,
        CreatePayment {
            user_id: auth.user_id,
            reference: payment_reference,
            amount: fee,
            payment_type: PaymentType::TaskCreation,
            payment_method: PaymentMethod::Wallet,
            status: PaymentStatus::Complete,
            meta: json!({ "task_key": task.task_key }),
        },
    )
    .await?;

    let task = Task::settle_payment_status(&mut *tx, task.id, PaymentStatus::Complete)
        .await?
        .ok_or_else(|| ApiError::InternalError("New task was already settled".to_string()))?;

    User::grant_role(&mut *tx, auth.user_id, UserRole::Advertiser).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        task_id = %task.id,
        fee,
        balance = debited.balance,
        "Task created and paid from wallet"
    );

    if let Some(telegram) = &state.telegram {
        telegram.notify_task_paid(&task);
    }

    Ok(ApiResponse::created("Task created successfully")
        .with("task", task)
        .with("balance", debited.balance))
}

async fn create_task_from_gateway(
    state: &AppState,
    auth: AuthContext,
    data: CreateTask,
    callback_url: String,
) -> ApiResult<ApiResponse> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut tx = state.db.begin().await?;
    let task = Task::create(&mut *tx, data).await?;
    User::grant_role(&mut *tx, auth.user_id, UserRole::Advertiser).await?;
    tx.commit().await?;

    let started = start_gateway_payment(
        state,
        &user,
        task.fee,
        PaymentType::TaskCreation,
        Some(callback_url),
        json!({ "task_key": task.task_key }),
    )
    .await;

    let (payment, initialized) = match started {
        Ok(started) => started,
        Err(e) => {
            Task::settle_payment_status(&state.db, task.id, PaymentStatus::Failed).await?;
            return Err(e);
        }
    };

    tracing::info!(
        user_id = %auth.user_id,
        task_id = %task.id,
        reference = %payment.reference,
        "Task created, awaiting gateway payment"
    );

    Ok(ApiResponse::ok("Payment initialized")
        .with("task", task)
        .with("payment_reference", payment.reference)
        .with("authorization_url", initialized.authorization_url))
}

/// Lists approved, paid tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<ApiResponse> {
    let task_type = query
        .task_type
        .as_deref()
        .map(|t| TaskType::parse(t).ok_or_else(|| ApiError::BadRequest(format!("Invalid task type: {}", t))))
        .transpose()?;

    let filter = TaskFilter {
        task_type,
        platform: query.platform,
        goal: query.goal,
    };

    let tasks = Task::list_available(&state.db, &filter, page.limit(), page.offset()).await?;
    let total = Task::count_available(&state.db, &filter).await?;

    Ok(ApiResponse::ok("Tasks fetched successfully").paginated("tasks", tasks, &page, total))
}

/// Fetches one task
///
/// Tasks not yet approved and paid are only visible to their creator.
pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id_or_key): Path<String>,
) -> ApiResult<ApiResponse> {
    let not_found = || ApiError::NotFound("Task not found".to_string());

    let task = Task::find_by_id_or_key(&state.db, &id_or_key)
        .await?
        .ok_or_else(not_found)?;

    if !task.is_available() {
        authorization::require_owner(&auth, task.creator_id).map_err(|_| not_found())?;
    }

    Ok(ApiResponse::ok("Task fetched successfully").with("task", task))
}

/// Counts available tasks grouped by `platform`, `goal`, `task_type`, `target_country`
/// or `gender`
pub async fn task_counts(
    State(state): State<AppState>,
    Path(field): Path<String>,
) -> ApiResult<ApiResponse> {
    let column = TaskCountField::parse(&field)
        .ok_or_else(|| ApiError::BadRequest(format!("Cannot count tasks by '{}'", field)))?;

    let counts: Vec<TaskCount> = Task::counts_by(&state.db, column)
        .await?
        .into_iter()
        .map(|(value, total)| TaskCount { value, total })
        .collect();

    Ok(ApiResponse::ok(format!("Task counts by {} fetched successfully", field)).with("counts", counts))
}

/// Lists the caller's own tasks
pub async fn current_user_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<ApiResponse> {
    let status = parse_task_status(query.status.as_deref())?;

    let tasks = Task::list_by_creator(&state.db, auth.user_id, status, page.limit(), page.offset()).await?;
    let total = Task::count_by_creator(&state.db, auth.user_id, status).await?;

    Ok(ApiResponse::ok("Current user tasks fetched successfully").paginated("tasks", tasks, &page, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(task_type: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            task_type: task_type.to_string(),
            platform: "Instagram".to_string(),
            fee: 500_000,
            payment_method: "trendit_wallet".to_string(),
            posts_count: None,
            target_country: None,
            target_state: None,
            gender: None,
            caption: None,
            hashtags: None,
            goal: None,
            account_link: None,
            engagements_count: None,
        }
    }

    fn fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::ValidationError(details) => details.into_iter().map(|d| d.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_advert_requires_posts() {
        let err = request("advert").into_create(Uuid::new_v4()).unwrap_err();
        assert_eq!(fields(err), vec!["posts_count"]);

        let mut req = request("advert");
        req.posts_count = Some(10);
        req.engagements_count = Some(99);
        let (data, choice) = req.into_create(Uuid::new_v4()).unwrap();
        assert_eq!(data.task_type, TaskType::Advert);
        assert_eq!(data.posts_count, 10);
        assert_eq!(data.engagements_count, 0);
        assert_eq!(choice, TaskPaymentChoice::Wallet);
    }

    #[test]
    fn test_engagement_requires_goal_and_count() {
        let err = request("engagement").into_create(Uuid::new_v4()).unwrap_err();
        assert_eq!(fields(err), vec!["goal", "engagements_count"]);

        let mut req = request("engagement");
        req.goal = Some(" follow ".to_string());
        req.engagements_count = Some(50);
        req.payment_method = "payment_gateway".to_string();
        let (data, choice) = req.into_create(Uuid::new_v4()).unwrap();
        assert_eq!(data.goal.as_deref(), Some("follow"));
        assert_eq!(choice, TaskPaymentChoice::Gateway);
    }

    #[test]
    fn test_invalid_fields_are_all_reported() {
        let mut req = request("survey");
        req.fee = 0;
        req.platform = " ".to_string();
        req.payment_method = "cash".to_string();

        let reported = fields(req.into_create(Uuid::new_v4()).unwrap_err());
        assert!(reported.contains(&"task_type".to_string()));
        assert!(reported.contains(&"payment_method".to_string()));
        assert!(reported.contains(&"platform".to_string()));
        assert!(reported.contains(&"fee".to_string()));
    }

    #[test]
    fn test_parse_task_status() {
        assert_eq!(parse_task_status(Some("approved")).unwrap(), Some(TaskStatus::Approved));
        assert_eq!(parse_task_status(None).unwrap(), None);
        assert!(parse_task_status(Some("done")).is_err());
    }
}
