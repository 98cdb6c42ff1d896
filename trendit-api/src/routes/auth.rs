//! Authentication endpoints
//!
//! # Endpoints
//!
//! - `POST /v1/auth/signup` - Register a new user
//! - `POST /v1/auth/login` - Login with email or username and get tokens
//! - `POST /v1/auth/refresh` - Refresh access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{extract::State, Json};
use serde::Deserialize;
use trendit_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User},
};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address or username
    #[validate(length(min = 1, message = "Email or username is required"))]
    pub email_or_username: String,

    /// Password
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Register a new user
///
/// Creates the user with an empty wallet and the `customer` role.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "username": "ada",
///   "password": "SecureP@ss123",
///   "name": "Ada Obi"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email or username already exists
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid_field("password", e))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::register(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            username: req.username.trim().to_string(),
            password_hash,
            name: req.name,
        },
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "User signed up");

    Ok(ApiResponse::created("Signup successful")
        .with("user", &user)
        .with("tokens", tokens))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email_or_username": "ada",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let invalid = || ApiError::Unauthorized("Invalid email/username or password".to_string());

    let user = User::find_by_login(&state.db, req.email_or_username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    let tokens = jwt::issue_token_pair(user.id, state.jwt_secret())?;

    Ok(ApiResponse::ok("Login successful")
        .with("user", &user)
        .with("tokens", tokens))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<ApiResponse> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(ApiResponse::ok("Token refreshed").with("access_token", access_token))
}
