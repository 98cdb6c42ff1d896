//! Admin alerts through the Telegram Bot API
//!
//! When a task becomes paid the admins' chat receives a summary with Approve / Reject
//! buttons. Button presses come back to `POST /v1/telegram/webhook` as callback queries
//! whose data is `approve_<task id>` or `reject_<task id>`.
//!
//! Alerts are best effort: [`TelegramNotifier::notify_task_paid`] runs in the background
//! and only logs failures.

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::task::{Task, TaskType};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Header Telegram echoes back on webhook deliveries when a secret token is registered
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub webhook_secret: Option<String>,
    pub api_base_url: String,
}

impl TelegramConfig {
    /// Reads `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` and `TELEGRAM_WEBHOOK_SECRET`
    ///
    /// Returns `None` (alerts disabled) unless both the token and the chat id are set.
    /// Without a webhook secret alerts still go out, but the webhook refuses every
    /// button press.
    pub fn from_env() -> Option<Self> {
        dotenvy::dotenv().ok();

        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Some(Self {
            bot_token: non_empty("TELEGRAM_BOT_TOKEN")?,
            chat_id: non_empty("TELEGRAM_CHAT_ID")?,
            webhook_secret: non_empty("TELEGRAM_WEBHOOK_SECRET"),
            api_base_url: non_empty("TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        })
    }
}

/// Admin decision carried by an inline keyboard button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Approve(Uuid),
    Reject(Uuid),
}

impl CallbackAction {
    pub fn task_id(&self) -> Uuid {
        match self {
            CallbackAction::Approve(id) | CallbackAction::Reject(id) => *id,
        }
    }
}

/// Parses `approve_<uuid>` / `reject_<uuid>`
pub fn parse_callback(data: &str) -> Option<CallbackAction> {
    let (action, id) = data.split_once('_')?;
    let id = Uuid::parse_str(id).ok()?;

    match action {
        "approve" => Some(CallbackAction::Approve(id)),
        "reject" => Some(CallbackAction::Reject(id)),
        _ => None,
    }
}

/// Message body for a newly paid task
pub fn task_alert_text(task: &Task) -> String {
    let mut lines = vec![
        "New Task Created".to_string(),
        format!("• Task Type: {}", task.task_type.as_str()),
        format!("• Payment Status: {}", task.payment_status.as_str()),
        format!("• Platform: {}", task.platform),
        format!("• Amount Paid: ₦{:.2}", task.fee as f64 / 100.0),
        format!("• Status: {}", task.status.as_str()),
    ];

    match task.task_type {
        TaskType::Advert => lines.push(format!("• Posts: {}", task.posts_count)),
        TaskType::Engagement => {
            if let Some(goal) = &task.goal {
                lines.push(format!("• Goal: {}", goal));
            }
            lines.push(format!("• Engagements: {}", task.engagements_count));
        }
    }

    lines.push(format!("• Date Created: {}", task.created_at.format("%Y-%m-%d %H:%M UTC")));
    lines.join("\n")
}

fn review_keyboard(task_id: Uuid) -> JsonValue {
    json!({
        "inline_keyboard": [[
            { "text": "Approve", "callback_data": format!("approve_{}", task_id) },
            { "text": "Reject", "callback_data": format!("reject_{}", task_id) },
        ]]
    })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    config: Arc<TelegramConfig>,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    async fn call(&self, method: &str, payload: JsonValue) -> Result<(), TelegramError> {
        let url = format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        );

        let response: ApiResponse = self.http.post(url).json(&payload).send().await?.json().await?;

        if response.ok {
            Ok(())
        } else {
            Err(TelegramError::Api(
                response.description.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    /// Posts the paid-task alert with review buttons
    pub async fn send_task_alert(&self, task: &Task) -> Result<(), TelegramError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.config.chat_id,
                "text": task_alert_text(task),
                "reply_markup": review_keyboard(task.id),
            }),
        )
        .await
    }

    /// Acknowledges a button press so the admin's client stops spinning
    pub async fn answer_callback(&self, callback_query_id: &str, text: &str) -> Result<(), TelegramError> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id, "text": text }),
        )
        .await
    }

    /// Sends the paid-task alert in the background
    pub fn notify_task_paid(&self, task: &Task) {
        let notifier = self.clone();
        let task = task.clone();

        tokio::spawn(async move {
            match notifier.send_task_alert(&task).await {
                Ok(()) => tracing::info!(task_id = %task.id, "Telegram task alert sent"),
                Err(e) => tracing::warn!(task_id = %task.id, error = %e, "Telegram task alert failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentStatus;
    use crate::models::task::TaskStatus;
    use axum::{extract::Path, routing::post, Json, Router};
    use chrono::Utc;
    use std::sync::Mutex;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            task_key: "AbCdEfGhIjKlMnOpQrSt".to_string(),
            creator_id: Uuid::new_v4(),
            task_type: TaskType::Engagement,
            platform: "instagram".to_string(),
            fee: 1_250_000,
            status: TaskStatus::Pending,
            payment_status: PaymentStatus::Complete,
            total_allocated: 0,
            total_success: 0,
            posts_count: 0,
            target_country: None,
            target_state: None,
            gender: None,
            caption: None,
            hashtags: None,
            goal: Some("follow".to_string()),
            account_link: Some("https://instagram.com/trendit".to_string()),
            engagements_count: 50,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_callback() {
        let id = Uuid::new_v4();

        assert_eq!(parse_callback(&format!("approve_{}", id)), Some(CallbackAction::Approve(id)));
        assert_eq!(parse_callback(&format!("reject_{}", id)), Some(CallbackAction::Reject(id)));
        assert_eq!(parse_callback(&format!("delete_{}", id)), None);
        assert_eq!(parse_callback("approve_42"), None);
        assert_eq!(parse_callback("approve"), None);
    }

    #[test]
    fn test_task_alert_text() {
        let task = sample_task();
        let text = task_alert_text(&task);

        assert!(text.starts_with("New Task Created"));
        assert!(text.contains("• Platform: instagram"));
        assert!(text.contains("• Amount Paid: ₦12500.00"));
        assert!(text.contains("• Goal: follow"));
    }

    #[tokio::test]
    async fn test_send_task_alert_posts_keyboard() {
        let received: Arc<Mutex<Vec<(String, JsonValue)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        let app = Router::new().route(
            "/:bot/:method",
            post(move |Path((bot, method)): Path<(String, String)>, Json(body): Json<JsonValue>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push((format!("{}/{}", bot, method), body));
                    Json(json!({ "ok": true, "result": {} }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = TelegramNotifier::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "-100200".to_string(),
            webhook_secret: None,
            api_base_url: format!("http://{}", addr),
        });

        let task = sample_task();
        notifier.send_task_alert(&task).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);

        let (path, body) = &received[0];
        assert_eq!(path, "bot123:abc/sendMessage");
        assert_eq!(body["chat_id"], "-100200");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            format!("approve_{}", task.id)
        );
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][1]["callback_data"],
            format!("reject_{}", task.id)
        );
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let app = Router::new().route(
            "/:bot/:method",
            post(|| async { Json(json!({ "ok": false, "description": "Bad Request: chat not found" })) }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let notifier = TelegramNotifier::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "missing".to_string(),
            webhook_secret: None,
            api_base_url: format!("http://{}", addr),
        });

        let result = notifier.send_task_alert(&sample_task()).await;
        assert!(matches!(result, Err(TelegramError::Api(message)) if message.contains("chat not found")));
    }
}
