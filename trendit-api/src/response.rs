//! Success envelope and pagination
//!
//! Successful handlers answer with
//!
//! ```json
//! { "status": "success", "status_code": 200, "message": "...", "<key>": ... }
//! ```
//!
//! Listings add `total`, `current_page` and `total_pages` next to the item key.
//!
//! # Example
//!
//! ```
//! use trendit_api::response::{ApiResponse, PageQuery};
//!
//! let page = PageQuery { page: Some(2), per_page: Some(5) };
//! let response = ApiResponse::ok("Tasks fetched successfully")
//!     .paginated("tasks", vec!["a", "b"], &page, 7);
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Success envelope builder
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status_code: StatusCode,
    message: String,
    extra: Map<String, JsonValue>,
}

impl ApiResponse {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// 200 OK
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, message)
    }

    /// 201 Created
    pub fn created(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CREATED, message)
    }

    /// Adds a top-level field
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::error!(key, error = %e, "Failed to serialize response field");
            JsonValue::Null
        });
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Adds one page of items plus the pagination fields
    pub fn paginated<T: Serialize>(self, key: &str, items: Vec<T>, page: &PageQuery, total: i64) -> Self {
        self.with(key, items)
            .with("total", total)
            .with("current_page", page.page())
            .with("total_pages", page.total_pages(total))
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut body = Map::with_capacity(self.extra.len() + 3);
        body.insert("status".to_string(), JsonValue::from("success"));
        body.insert("status_code".to_string(), JsonValue::from(self.status_code.as_u16()));
        body.insert("message".to_string(), JsonValue::from(self.message));
        body.extend(self.extra);

        (self.status_code, Json(JsonValue::Object(body))).into_response()
    }
}

/// `?page=&per_page=` query parameters
///
/// Out-of-range values are clamped: `page` to at least 1, `per_page` to `1..=100`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        let per_page = self.per_page();
        (total.max(0) + per_page - 1) / per_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> JsonValue {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::created("Task Performed successfully")
            .with("performed_task", serde_json::json!({ "status": "in_review" }))
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["status_code"], 201);
        assert_eq!(json["message"], "Task Performed successfully");
        assert_eq!(json["performed_task"]["status"], "in_review");
    }

    #[tokio::test]
    async fn test_paginated_fields() {
        let page = PageQuery {
            page: Some(2),
            per_page: Some(3),
        };
        let json = body_json(
            ApiResponse::ok("ok")
                .paginated("items", vec![4, 5, 6], &page, 7)
                .into_response(),
        )
        .await;

        assert_eq!(json["items"], serde_json::json!([4, 5, 6]));
        assert_eq!(json["total"], 7);
        assert_eq!(json["current_page"], 2);
        assert_eq!(json["total_pages"], 3);
    }

    #[test]
    fn test_page_defaults() {
        let page = PageQuery::default();
        assert_eq!(page.page(), 1);
        assert_eq!(page.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(page.offset(), 0);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn test_page_bounds_are_clamped() {
        let page = PageQuery {
            page: Some(-3),
            per_page: Some(10_000),
        };
        assert_eq!(page.page(), 1);
        assert_eq!(page.per_page(), MAX_PER_PAGE);

        let page = PageQuery {
            page: Some(3),
            per_page: Some(0),
        };
        assert_eq!(page.per_page(), 1);
        assert_eq!(page.offset(), 2);
    }
}
