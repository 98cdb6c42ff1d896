//! Account settings
//!
//! - `GET|PUT /v1/settings/notifications` - email, in-app and push preferences
//! - `GET|PUT /v1/settings/preferences` - UI appearance
//! - `GET|PUT /v1/settings/security` - two-factor method

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{extract::State, Json};
use serde::Deserialize;
use trendit_shared::{
    auth::middleware::AuthContext,
    models::{
        settings::{Appearance, NotificationPreferencesUpdate, UserSettings},
        user::{TwoFactorMethod, User},
    },
};

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    /// `light`, `dark` or `system`
    pub appearance: String,
}

#[derive(Debug, Deserialize)]
pub struct SecuritySettingsRequest {
    /// `email`, `google_auth`, `phone`, or null to disable
    pub two_fa_method: Option<String>,
}

pub async fn get_notification_settings(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let settings = UserSettings::get_or_create(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("Notification preferences fetched successfully")
        .with("notification_preference", settings.notification_preferences()))
}

/// Absent channels and fields keep their current value
pub async fn update_notification_settings(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(update): Json<NotificationPreferencesUpdate>,
) -> ApiResult<ApiResponse> {
    let settings = UserSettings::update_notifications(&state.db, auth.user_id, &update).await?;

    Ok(ApiResponse::ok("Notification preferences updated successfully")
        .with("notification_preference", settings.notification_preferences()))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let settings = UserSettings::get_or_create(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("Preferences fetched successfully").with("appearance", settings.appearance()))
}

/// # Errors
///
/// - `400 Bad Request`: appearance is not `light`, `dark` or `system`
pub async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PreferencesRequest>,
) -> ApiResult<ApiResponse> {
    let appearance = Appearance::parse(&req.appearance)?;
    let settings = UserSettings::set_appearance(&state.db, auth.user_id, appearance).await?;

    Ok(ApiResponse::ok("Preferences updated successfully").with("appearance", settings.appearance()))
}

pub async fn get_security(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok("Security settings fetched successfully").with("two_fa_method", user.two_fa_method))
}

/// Sets the two-factor method
///
/// # Errors
///
/// - `400 Bad Request`: method is not `email`, `google_auth` or `phone`
pub async fn update_security(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SecuritySettingsRequest>,
) -> ApiResult<ApiResponse> {
    let method = TwoFactorMethod::parse(req.two_fa_method.as_deref())?;

    let user = User::set_two_fa_method(&state.db, auth.user_id, method)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        user_id = %auth.user_id,
        two_fa_method = method.map(|m| m.as_str()).unwrap_or("disabled"),
        "Security settings updated"
    );

    Ok(ApiResponse::ok("Security settings updated successfully")
        .with("two_fa_method", user.two_fa_method))
}
