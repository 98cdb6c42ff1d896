//! User profile
//!
//! - `GET /v1/profile` - user, roles and wallet
//! - `PUT /v1/profile` - update name, gender, country, state

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
        user::{UpdateProfile, User},
        wallet::Wallet,
    },
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 20, message = "Gender must be at most 20 characters"))]
    pub gender: Option<String>,

    #[validate(length(max = 100, message = "Country must be at most 100 characters"))]
    pub country: Option<String>,

    #[validate(length(max = 100, message = "State must be at most 100 characters"))]
    pub state: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let roles = User::roles(&state.db, auth.user_id).await?;
    let wallet = Wallet::find_by_user(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("User profile fetched successfully")
        .with("user", user)
        .with("roles", roles)
        .with("wallet", wallet))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let user = User::update_profile(
        &state.db,
        auth.user_id,
        UpdateProfile {
            name: req.name,
            gender: req.gender,
            country: req.country,
            state: req.state,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok("Profile updated successfully").with("user", user))
}
