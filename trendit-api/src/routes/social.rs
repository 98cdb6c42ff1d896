//! Linked social media accounts
//!
//! - `GET    /v1/social-profiles`
//! - `POST   /v1/social-profiles` - link a platform and request verification
//! - `DELETE /v1/social-profiles/:platform`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use trendit_shared::{
    auth::middleware::AuthContext,
    models::social::SocialProfile,
    social,
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LinkProfileRequest {
    pub platform: String,

    #[validate(length(min = 1, max = 500, message = "Link is required"))]
    pub link: String,
}

pub async fn list_profiles(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let profiles = SocialProfile::list_by_user(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("Social media profiles fetched successfully").with("social_profiles", profiles))
}

/// # Errors
///
/// - `400 Bad Request`: unknown platform
/// - `422`: the link is not a profile URL on that platform
/// - `409 Conflict`: the platform is already linked
pub async fn link_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<LinkProfileRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;
    let platform = social::parse_platform(&req.platform)?;

    let (profile, verification) = social::link_profile(&state.db, auth.user_id, platform, &req.link).await?;

    Ok(ApiResponse::created(format!("{} profile has been submitted for review", platform.as_str()))
        .with("social_profile", profile)
        .with("social_verification", verification))
}

pub async fn unlink_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(platform): Path<String>,
) -> ApiResult<ApiResponse> {
    let platform = social::parse_platform(&platform)?;
    social::unlink_profile(&state.db, auth.user_id, platform).await?;

    Ok(ApiResponse::ok(format!("{} account removed successfully", platform.as_str())))
}
