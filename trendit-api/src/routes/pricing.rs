//! Price list
//!
//! - `GET    /v1/pricing` (public)
//! - `POST   /v1/admin/pricing`
//! - `PUT    /v1/admin/pricing/:id`
//! - `DELETE /v1/admin/pricing/:id`

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
use trendit_shared::models::pricing::{CreatePricing, Pricing, UpdatePricing};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePricingRequest {
    #[validate(length(min = 1, max = 100, message = "Item name is required"))]
    pub item_name: String,

    /// Minor units
    #[validate(range(min = 1, message = "Price must be greater than zero"))]
    pub price: i64,

    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePricingRequest {
    #[validate(length(min = 1, max = 100, message = "Item name cannot be empty"))]
    pub item_name: Option<String>,

    #[validate(range(min = 1, message = "Price must be greater than zero"))]
    pub price: Option<i64>,

    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Pricing item not found".to_string())
}

pub async fn list_pricing(State(state): State<AppState>) -> ApiResult<ApiResponse> {
    let pricing = Pricing::list(&state.db).await?;

    Ok(ApiResponse::ok("Pricing fetched successfully").with("pricing", pricing))
}

/// # Errors
///
/// - `409 Conflict`: an item with that name exists
pub async fn create_pricing(
    State(state): State<AppState>,
    Json(req): Json<CreatePricingRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let pricing = Pricing::create(
        &state.db,
        CreatePricing {
            item_name: req.item_name.trim().to_lowercase(),
            price: req.price,
            description: req.description,
        },
    )
    .await?;

    tracing::info!(item_name = %pricing.item_name, price = pricing.price, "Pricing item created");

    Ok(ApiResponse::created("Pricing item created").with("pricing", pricing))
}

pub async fn update_pricing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePricingRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;

    let pricing = Pricing::update(
        &state.db,
        id,
        UpdatePricing {
            item_name: req.item_name.map(|n| n.trim().to_lowercase()),
            price: req.price,
            description: req.description,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(ApiResponse::ok("Pricing item updated").with("pricing", pricing))
}

pub async fn delete_pricing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse> {
    if !Pricing::delete(&state.db, id).await? {
        return Err(not_found());
    }

    Ok(ApiResponse::ok("Pricing item deleted"))
}
