//! Withdrawals to a bank account
//!
//! - `POST /v1/withdraw`
//! - `GET  /v1/withdrawals`
//!
//! The wallet is debited and the withdrawal recorded in one transaction before the
//! gateway is asked for the transfer. If the gateway refuses, the withdrawal is settled
//! as failed, which refunds the wallet. Otherwise the transfer webhook settles it. A
//! timeout or unreadable answer leaves the withdrawal pending with the error noted,
//! since the money may already be on its way.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use trendit_shared::{
    auth::middleware::AuthContext,
    models::withdrawal::{CreateWithdrawal, Withdrawal, WithdrawalStatus},
    payments::{GatewayError, TransferRequest, TransferStatus},
    reference,
    settlement::settle_withdrawal,
    wallet,
};
use validator::Validate;

/// Smallest withdrawal, minor units (₦100)
pub const MIN_WITHDRAWAL: i64 = 100_00;

#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawRequest {
    /// Minor units
    #[validate(range(min = 10000, message = "Minimum withdrawal is 100.00"))]
    pub amount: i64,

    #[validate(length(min = 1, max = 20, message = "Bank code is required"))]
    pub bank_code: String,

    #[validate(length(min = 1, max = 100, message = "Bank name is required"))]
    pub bank_name: String,

    #[validate(length(min = 10, max = 10, message = "Account number must be 10 digits"))]
    pub account_no: String,

    #[validate(length(min = 1, max = 100, message = "Account name is required"))]
    pub account_name: String,
}

/// Requests a payout
///
/// # Errors
///
/// - `422`: amount below the minimum or bad bank details
/// - `400 Bad Request`: insufficient balance
pub async fn withdraw(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<ApiResponse> {
    req.validate().map_err(ApiError::from_validation)?;
    if !req.account_no.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::invalid_field("account_no", "Account number must be 10 digits"));
    }

    let withdrawal_reference = reference::withdrawal_reference();

    let mut tx = state.db.begin().await?;

    wallet::debit(
        &mut tx,
        auth.user_id,
        req.amount,
        &withdrawal_reference,
        &format!("Withdrawal to {} {}", req.bank_name, req.account_no),
    )
    .await?;

    let withdrawal = Withdrawal::create(
        &mut *tx,
        CreateWithdrawal {
            user_id: auth.user_id,
            reference: withdrawal_reference,
            amount: req.amount,
            bank_code: req.bank_code,
            bank_name: req.bank_name,
            account_no: req.account_no,
            account_name: req.account_name,
        },
    )
    .await?;

    tx.commit().await?;

    let transfer = state
        .gateway
        .initiate_transfer(&TransferRequest {
            reference: withdrawal.reference.clone(),
            amount: withdrawal.amount,
            bank_code: withdrawal.bank_code.clone(),
            account_no: withdrawal.account_no.clone(),
            account_name: withdrawal.account_name.clone(),
            reason: "Trendit wallet withdrawal".to_string(),
        })
        .await;

    let mut pending_error = None;
    let settled = match transfer {
        Ok(outcome) => match outcome.status {
            TransferStatus::Pending => None,
            TransferStatus::Success => Some((WithdrawalStatus::Completed, None)),
            TransferStatus::Failed => Some((WithdrawalStatus::Failed, Some("Transfer failed at the payment gateway".to_string()))),
        },
        Err(GatewayError::Api(reason) | GatewayError::NotConfigured(reason)) => {
            tracing::warn!(reference = %withdrawal.reference, reason = %reason, "Transfer rejected");
            Some((WithdrawalStatus::Failed, Some(reason)))
        }
        Err(e) => {
            // The provider may have accepted the transfer; its webhook settles it
            tracing::error!(reference = %withdrawal.reference, error = %e, "Transfer outcome unknown");
            pending_error = Some(e.to_string());
            None
        }
    };

    let withdrawal = match (settled, pending_error) {
        (Some((outcome, reason)), _) => settle_withdrawal(&state.db, &withdrawal.reference, outcome, reason.as_deref())
            .await?
            .into_record(),
        (None, Some(error)) => Withdrawal::note_transfer_error(&state.db, withdrawal.id, &error)
            .await?
            .unwrap_or(withdrawal),
        (None, None) => withdrawal,
    };

    tracing::info!(
        user_id = %auth.user_id,
        reference = %withdrawal.reference,
        amount = withdrawal.amount,
        status = withdrawal.status.as_str(),
        "Withdrawal requested"
    );

    let message = match withdrawal.status {
        WithdrawalStatus::Failed | WithdrawalStatus::Reversed => {
            "Withdrawal could not be processed; the amount was returned to your wallet"
        }
        WithdrawalStatus::Completed => "Withdrawal completed",
        WithdrawalStatus::Pending => "Withdrawal is being processed",
    };

    Ok(ApiResponse::created(message).with("withdrawal", withdrawal))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let withdrawals = Withdrawal::list_by_user(&state.db, auth.user_id, page.limit(), page.offset()).await?;
    let total = Withdrawal::count_by_user(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("Withdrawals fetched successfully").paginated("withdrawals", withdrawals, &page, total))
}
