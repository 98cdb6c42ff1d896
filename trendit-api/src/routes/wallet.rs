//! Wallet balance and ledger
//!
//! - `GET /v1/wallet/balance`
//! - `GET /v1/transactions?transaction_type=credit|debit`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
};
use axum::extract::{Query, State};
use serde::Deserialize;
use trendit_shared::{
    auth::middleware::AuthContext,
    models::{
        transaction::{LedgerEntry, TransactionType},
        wallet::Wallet,
    },
};

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub transaction_type: Option<String>,
}

pub async fn balance(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<ApiResponse> {
    let wallet = Wallet::find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Wallet not found".to_string()))?;

    Ok(ApiResponse::ok("Balance fetched successfully")
        .with("balance", wallet.balance)
        .with("currency_code", &wallet.currency_code)
        .with("currency_name", &wallet.currency_name))
}

pub async fn transactions(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<ApiResponse> {
    let transaction_type = query
        .transaction_type
        .as_deref()
        .map(|t| t.parse::<TransactionType>().map_err(ApiError::BadRequest))
        .transpose()?;

    let entries =
        LedgerEntry::list_by_user(&state.db, auth.user_id, transaction_type, page.limit(), page.offset()).await?;
    let total = LedgerEntry::count_by_user(&state.db, auth.user_id, transaction_type).await?;

    Ok(ApiResponse::ok("Transactions fetched successfully").paginated("transactions", entries, &page, total))
}
