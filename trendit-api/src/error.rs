//! Error handling for the API server
//!
//! Every handler returns `Result<T, ApiError>`. Errors render the failure envelope
//!
//! ```json
//! { "status": "failed", "status_code": 409, "message": "...", "errors": [...] }
//! ```
//!
//! where `errors` is only present for validation failures. Library errors convert with
//! `?` through the `From` impls below, so handlers rarely build an `ApiError` by hand.
//!
//! # Example
//!
//! ```
//! use trendit_api::error::{ApiError, ApiResult};
//!
//! fn find(id: u32) -> ApiResult<&'static str> {
//!     match id {
//!         1 => Ok("task"),
//!         _ => Err(ApiError::NotFound("Task not found".to_string())),
//!     }
//! }
//! ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use trendit_shared::{
    assignment::AssignmentError,
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError},
    models::user::SettingsError,
    payments::GatewayError,
    review::ReviewError,
    settlement::SettlementError,
    social::SocialError,
    wallet::WalletError,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Not acceptable (406), e.g. an unsupported payment type
    NotAcceptable(String),

    /// Conflict (409), e.g. duplicate email or a pending task
    Conflict(String),

    /// Unprocessable entity (422), validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Partial content (206): the request was fine but there was nothing to hand out
    PartialContent(String),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),

    /// Bad gateway (502): the payment provider failed
    BadGateway(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"failed"`
    pub status: String,

    pub status_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Field errors, for validation failures only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Builds a 422 from `validator` errors
    pub fn from_validation(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(details)
    }

    /// 422 for a single field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PartialContent(_) => StatusCode::PARTIAL_CONTENT,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::NotAcceptable(msg) => write!(f, "Not acceptable: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::PartialContent(msg) => write!(f, "Nothing available: {}", msg),
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let (message, errors) = match self {
            ApiError::ValidationError(errors) => ("Request validation failed".to_string(), Some(errors)),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadGateway(msg) => {
                tracing::warn!("Payment gateway error: {}", msg);
                ("Payment provider is unavailable, please try again".to_string(), None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::NotAcceptable(msg)
            | ApiError::Conflict(msg)
            | ApiError::PartialContent(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::RateLimitExceeded { message: msg, .. } => (msg, None),
        };

        let body = Json(ErrorResponse {
            status: "failed".to_string(),
            status_code: status.as_u16(),
            message,
            errors,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    if constraint.contains("username") {
                        return ApiError::Conflict("Username already exists".to_string());
                    }
                    if db_err.is_unique_violation() {
                        return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                    }
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing authorization header".to_string()),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::MissingRole(_) | AuthzError::NotAuthorized => ApiError::Forbidden(err.to_string()),
            AuthzError::DatabaseError(err) => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::InvalidTwoFactorMethod | SettingsError::InvalidAppearance => {
                ApiError::BadRequest(err.to_string())
            }
            SettingsError::Database(err) => err.into(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientBalance { .. } => ApiError::BadRequest(err.to_string()),
            WalletError::InvalidAmount(_) => ApiError::invalid_field("amount", err.to_string()),
            WalletError::WalletNotFound(_) => ApiError::NotFound("Wallet not found".to_string()),
            WalletError::Database(err) => err.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::PaymentNotFound(_) => ApiError::NotFound("Payment not found".to_string()),
            SettlementError::WithdrawalNotFound(_) => ApiError::NotFound("Withdrawal not found".to_string()),
            SettlementError::Wallet(err) => err.into(),
            SettlementError::Database(err) => err.into(),
        }
    }
}

impl From<AssignmentError> for ApiError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::PendingTask | AssignmentError::AlreadyPerformed => ApiError::Conflict(err.to_string()),
            AssignmentError::NoUnassignedTask => ApiError::PartialContent(err.to_string()),
            AssignmentError::InvalidTaskType(_) => ApiError::BadRequest(err.to_string()),
            AssignmentError::TaskNotFound | AssignmentError::PerformanceNotFound => {
                ApiError::NotFound(err.to_string())
            }
            AssignmentError::InvalidState(_) => ApiError::Conflict(err.to_string()),
            AssignmentError::Database(err) => err.into(),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::TaskNotFound | ReviewError::PerformanceNotFound => ApiError::NotFound(err.to_string()),
            ReviewError::InvalidState(_) => ApiError::Conflict(err.to_string()),
            ReviewError::Wallet(err) => err.into(),
            ReviewError::Database(err) => err.into(),
        }
    }
}

impl From<SocialError> for ApiError {
    fn from(err: SocialError) -> Self {
        match err {
            SocialError::InvalidPlatform => ApiError::BadRequest(err.to_string()),
            SocialError::InvalidLink(_) => ApiError::invalid_field("link", err.to_string()),
            SocialError::AlreadyLinked(_) | SocialError::AlreadyDecided(_) => ApiError::Conflict(err.to_string()),
            SocialError::ProfileNotFound(_) | SocialError::VerificationNotFound => ApiError::NotFound(err.to_string()),
            SocialError::Database(err) => err.into(),
        }
    }
}
