//! Gateway payments
//!
//! # Endpoints
//!
//! - `POST /v1/payment` - start a hosted checkout
//! - `POST /v1/payment/verify` - ask the gateway about a payment and settle it
//! - `GET  /v1/payment/history` - the caller's payments
//! - `POST /v1/payment/webhook` - gateway deliveries (public, signature checked)
//!
//! Verify, the webhook and the worker's reconciliation all end in
//! [`settle_payment`], which applies a payment's effect at most once.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::{ApiResponse, PageQuery},
};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use trendit_shared::{
    auth::{authorization, middleware::AuthContext},
    models::{
        payment::{CreatePayment, Payment, PaymentMethod, PaymentStatus, PaymentType},
        user::User,
        withdrawal::WithdrawalStatus,
    },
    payments::{InitializeRequest, InitializedPayment, WebhookEvent},
    reference,
    settlement::{settle_payment, settle_withdrawal, SettlementError, SettlementOutcome},
};

#[derive(Debug, Deserialize)]
pub struct InitializePaymentRequest {
    /// Minor units
    pub amount: i64,

    /// `credit-wallet`, `membership-fee` or `item-upload`
    pub payment_type: String,

    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub reference: String,
}

/// Records a pending payment, then asks the gateway for a checkout URL
///
/// The payment row exists before the gateway is called, so a webhook can never arrive
/// for a reference Trendit does not know. A gateway failure marks the payment `failed`.
pub(crate) async fn start_gateway_payment(
    state: &AppState,
    user: &User,
    amount: i64,
    payment_type: PaymentType,
    callback_url: Option<String>,
    meta: JsonValue,
) -> ApiResult<(Payment, InitializedPayment)> {
    let payment = Payment::create(
        &state.db,
        CreatePayment {
            user_id: user.id,
            reference: reference::payment_reference(),
            amount,
            payment_type,
            payment_method: state.gateway.method(),
            status: PaymentStatus::Pending,
            meta: meta.clone(),
        },
    )
    .await?;

    let mut gateway_meta = meta;
    if let Some(fields) = gateway_meta.as_object_mut() {
        fields.insert("payment_type".to_string(), json!(payment_type.as_str()));
        fields.insert("user_id".to_string(), json!(user.id));
    }

    let request = InitializeRequest {
        reference: payment.reference.clone(),
        amount,
        email: user.email.clone(),
        callback_url,
        meta: gateway_meta,
    };

    match state.gateway.initialize(&request).await {
        Ok(initialized) => {
            tracing::info!(
                user_id = %user.id,
                reference = %payment.reference,
                payment_type = payment_type.as_str(),
                amount,
                "Gateway payment initialized"
            );
            Ok((payment, initialized))
        }
        Err(e) => {
            tracing::warn!(reference = %payment.reference, error = %e, "Gateway initialize failed");
            Payment::mark_failed(&state.db, payment.id).await?;
            Err(e.into())
        }
    }
}

/// Starts a gateway payment
///
/// # Errors
///
/// - `406 Not Acceptable`: unsupported payment type
/// - `409 Conflict`: membership fee already paid
/// - `422`: amount not positive
/// - `502 Bad Gateway`: the gateway refused the checkout
pub async fn initialize_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<InitializePaymentRequest>,
) -> ApiResult<ApiResponse> {
    let payment_type = match PaymentType::parse(&req.payment_type) {
        Some(PaymentType::TaskCreation) => {
            return Err(ApiError::NotAcceptable(
                "Task payments are started from POST /v1/tasks".to_string(),
            ))
        }
        Some(payment_type) => payment_type,
        None => {
            return Err(ApiError::NotAcceptable(format!(
                "Payment type '{}' is not supported",
                req.payment_type
            )))
        }
    };

    if req.amount <= 0 {
        return Err(ApiError::invalid_field("amount", "Amount must be greater than zero"));
    }

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if payment_type == PaymentType::MembershipFee && user.membership_fee_paid {
        return Err(ApiError::Conflict("Membership fee has already been paid".to_string()));
    }

    let (payment, initialized) =
        start_gateway_payment(&state, &user, req.amount, payment_type, req.callback_url, json!({})).await?;

    Ok(ApiResponse::ok("Payment initialized")
        .with("payment_reference", payment.reference)
        .with("authorization_url", initialized.authorization_url))
}

fn verify_message(payment: &Payment) -> &'static str {
    match payment.status {
        PaymentStatus::Complete => "Payment verified successfully",
        PaymentStatus::Pending => "Payment is still pending",
        PaymentStatus::Failed => "Payment failed",
        PaymentStatus::Abandoned => "Payment was abandoned",
    }
}

/// Verifies a payment with the gateway and settles it
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<ApiResponse> {
    let not_found = || ApiError::NotFound("Payment not found".to_string());

    let payment = Payment::find_by_reference(&state.db, req.reference.trim())
        .await?
        .ok_or_else(not_found)?;
    authorization::require_owner(&auth, payment.user_id).map_err(|_| not_found())?;

    let outcome = if payment.payment_method == PaymentMethod::Wallet || payment.status != PaymentStatus::Pending {
        SettlementOutcome::AlreadySettled(payment)
    } else {
        let verification = state.gateway.verify(&payment.reference).await?;
        settle_payment(&state.db, &verification, state.telegram.as_ref()).await?
    };

    let settled = outcome.is_settled();
    let payment = outcome.into_record();

    Ok(ApiResponse::ok(verify_message(&payment))
        .with("settled", settled)
        .with("payment", payment))
}

pub async fn payment_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse> {
    let payments = Payment::list_by_user(&state.db, auth.user_id, page.limit(), page.offset()).await?;
    let total = Payment::count_by_user(&state.db, auth.user_id).await?;

    Ok(ApiResponse::ok("Payment history fetched successfully").paginated("payments", payments, &page, total))
}

/// Gateway webhook
///
/// The signature is checked against the raw body before anything is parsed. Unknown
/// references and events are acknowledged with 200 so the gateway stops retrying.
///
/// # Errors
///
/// - `401 Unauthorized`: missing or wrong signature; nothing is settled
/// - `400 Bad Request`: body is not a recognisable event
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse> {
    if !state.gateway.verify_webhook(&headers, &body) {
        tracing::warn!(body_len = body.len(), "Rejected webhook with invalid signature");
        return Err(ApiError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event = state
        .gateway
        .parse_webhook(&body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed webhook: {}", e)))?;

    match event {
        WebhookEvent::Charge(verification) => {
            match settle_payment(&state.db, &verification, state.telegram.as_ref()).await {
                Ok(outcome) => Ok(ApiResponse::ok("Webhook processed")
                    .with("settled", outcome.is_settled())
                    .with("status", outcome.record().status)),
                Err(SettlementError::PaymentNotFound(reference)) => {
                    tracing::warn!(reference = %reference, "Webhook for unknown payment");
                    Ok(ApiResponse::ok("Unknown payment reference"))
                }
                Err(e) => Err(e.into()),
            }
        }
        WebhookEvent::Transfer { reference, outcome } => {
            let reason = match outcome {
                WithdrawalStatus::Failed => Some("Transfer failed at the payment gateway"),
                WithdrawalStatus::Reversed => Some("Transfer reversed by the payment gateway"),
                _ => None,
            };

            match settle_withdrawal(&state.db, &reference, outcome, reason).await {
                Ok(settled) => Ok(ApiResponse::ok("Webhook processed")
                    .with("settled", settled.is_settled())
                    .with("status", settled.record().status)),
                Err(SettlementError::WithdrawalNotFound(reference)) => {
                    tracing::warn!(reference = %reference, "Webhook for unknown withdrawal");
                    Ok(ApiResponse::ok("Unknown withdrawal reference"))
                }
                Err(e) => Err(e.into()),
            }
        }
        WebhookEvent::Ignored(event) => {
            tracing::debug!(event = %event, "Ignoring webhook event");
            Ok(ApiResponse::ok("Event ignored"))
        }
    }
}
