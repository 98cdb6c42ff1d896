//! Paystack client
//!
//! Paystack takes amounts in kobo, so minor units pass through unchanged. Every call is
//! authenticated with `Authorization: Bearer <secret key>`; webhooks are signed with
//! `X-Paystack-Signature = hex(HMAC-SHA512(secret key, raw body))`.

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;

use super::{
    GatewayError, GatewayStatus, InitializeRequest, InitializedPayment, PaymentGateway,
    TransferOutcome, TransferRequest, TransferStatus, Verification, WebhookEvent,
};
use crate::models::payment::PaymentMethod;
use crate::models::withdrawal::WithdrawalStatus;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

pub struct PaystackGateway {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
    currency: String,
}

/// Every Paystack response is wrapped in `{status, message, data}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    reference: String,
    status: String,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    reference: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    reference: Option<String>,
    status: Option<String>,
    amount: Option<i64>,
}

impl PaystackGateway {
    pub fn new(http: reqwest::Client, secret_key: String, base_url: String, currency: String) -> Self {
        Self {
            http,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_recipient(&self, request: &TransferRequest) -> Result<String, GatewayError> {
        let response = self
            .http
            .post(self.url("/transferrecipient"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "type": "nuban",
                "name": request.account_name,
                "account_number": request.account_no,
                "bank_code": request.bank_code,
                "currency": self.currency,
            }))
            .send()
            .await?;

        let data: RecipientData = read_envelope(response).await?;
        Ok(data.recipient_code)
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let http_status = response.status();
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(format!("HTTP {}: {}", http_status, e)))?;

    if !envelope.status {
        return Err(GatewayError::Api(envelope.message));
    }

    envelope
        .data
        .ok_or_else(|| GatewayError::InvalidResponse("response has no data".to_string()))
}

fn charge_status(status: &str) -> GatewayStatus {
    match status.to_lowercase().as_str() {
        "success" => GatewayStatus::Success,
        "failed" | "reversed" => GatewayStatus::Failed,
        "abandoned" => GatewayStatus::Abandoned,
        _ => GatewayStatus::Pending,
    }
}

fn transfer_status(status: &str) -> TransferStatus {
    match status.to_lowercase().as_str() {
        "success" => TransferStatus::Success,
        "failed" | "reversed" | "rejected" => TransferStatus::Failed,
        _ => TransferStatus::Pending,
    }
}

/// Parses a Paystack-shaped webhook body
pub(crate) fn parse_event(body: &[u8]) -> Result<WebhookEvent, GatewayError> {
    let webhook: WebhookBody = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("invalid webhook body: {}", e)))?;

    let reference = || {
        webhook
            .data
            .reference
            .clone()
            .ok_or_else(|| GatewayError::InvalidResponse("webhook has no reference".to_string()))
    };

    let event = match webhook.event.as_str() {
        "charge.success" => WebhookEvent::Charge(Verification {
            reference: reference()?,
            status: charge_status(webhook.data.status.as_deref().unwrap_or("success")),
            amount: webhook.data.amount.unwrap_or_default(),
        }),
        "transfer.success" => WebhookEvent::Transfer {
            reference: reference()?,
            outcome: WithdrawalStatus::Completed,
        },
        "transfer.failed" => WebhookEvent::Transfer {
            reference: reference()?,
            outcome: WithdrawalStatus::Failed,
        },
        "transfer.reversed" => WebhookEvent::Transfer {
            reference: reference()?,
            outcome: WithdrawalStatus::Reversed,
        },
        other => WebhookEvent::Ignored(other.to_string()),
    };

    Ok(event)
}

/// Hex HMAC-SHA512 of `body` keyed with `secret`
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn signature_matches(secret: &str, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError> {
        let response = self
            .http
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "email": request.email,
                "amount": request.amount,
                "reference": request.reference,
                "currency": self.currency,
                "callback_url": request.callback_url,
                "metadata": request.meta,
            }))
            .send()
            .await?;

        let data: InitializeData = read_envelope(response).await?;

        tracing::info!(reference = %data.reference, "Paystack payment initialized");

        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/transaction/verify/{}", reference)))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let data: TransactionData = read_envelope(response).await?;

        Ok(Verification {
            reference: data.reference,
            status: charge_status(&data.status),
            amount: data.amount,
        })
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, GatewayError> {
        let recipient_code = self.create_recipient(request).await?;

        let response = self
            .http
            .post(self.url("/transfer"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "source": "balance",
                "amount": request.amount,
                "reference": request.reference,
                "recipient": recipient_code,
                "reason": request.reason,
                "currency": self.currency,
            }))
            .send()
            .await?;

        let data: TransferData = read_envelope(response).await?;

        tracing::info!(reference = %data.reference, status = %data.status, "Paystack transfer requested");

        Ok(TransferOutcome {
            reference: data.reference,
            status: transfer_status(&data.status),
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        signature_matches(&self.secret_key, headers, body)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        parse_event(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderValue, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;

    const SECRET: &str = "sk_test_trendit";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", SECRET))
            .unwrap_or(false)
    }

    async fn spawn_paystack() -> String {
        let app = Router::new()
            .route(
                "/transaction/initialize",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"status": false, "message": "Invalid key"})));
                    }
                    let reference = body["reference"].as_str().unwrap_or_default().to_string();
                    (
                        StatusCode::OK,
                        Json(json!({
                            "status": true,
                            "message": "Authorization URL created",
                            "data": {
                                "authorization_url": format!("https://checkout.paystack.com/{}", reference),
                                "access_code": "ac_123",
                                "reference": reference,
                                "amount_seen": body["amount"],
                            }
                        })),
                    )
                }),
            )
            .route(
                "/transaction/verify/:reference",
                get(|Path(reference): Path<String>| async move {
                    let (status, amount) = match reference.as_str() {
                        "paid" => ("success", 500_000),
                        "gone" => ("abandoned", 500_000),
                        _ => ("ongoing", 0),
                    };
                    Json(json!({
                        "status": true,
                        "message": "Verification successful",
                        "data": { "reference": reference, "status": status, "amount": amount }
                    }))
                }),
            )
            .route(
                "/transferrecipient",
                post(|Json(body): Json<Value>| async move {
                    if body["account_number"] == "0000000000" {
                        return Json(json!({"status": false, "message": "Could not resolve account name"}));
                    }
                    Json(json!({"status": true, "message": "ok", "data": {"recipient_code": "RCP_abc"}}))
                }),
            )
            .route(
                "/transfer",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["recipient"], "RCP_abc");
                    Json(json!({
                        "status": true,
                        "message": "Transfer has been queued",
                        "data": { "reference": body["reference"], "status": "pending" }
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn gateway(base_url: String, secret: &str) -> PaystackGateway {
        PaystackGateway::new(reqwest::Client::new(), secret.to_string(), base_url, "NGN".to_string())
    }

    #[tokio::test]
    async fn test_initialize_returns_authorization_url() {
        let gateway = gateway(spawn_paystack().await, SECRET);

        let initialized = gateway
            .initialize(&InitializeRequest {
                reference: "pay-1-abc".to_string(),
                amount: 250_000,
                email: "ada@example.com".to_string(),
                callback_url: None,
                meta: json!({}),
            })
            .await
            .unwrap();

        assert_eq!(initialized.reference, "pay-1-abc");
        assert_eq!(initialized.authorization_url, "https://checkout.paystack.com/pay-1-abc");
    }

    #[tokio::test]
    async fn test_initialize_rejected_key() {
        let gateway = gateway(spawn_paystack().await, "sk_wrong");

        let result = gateway
            .initialize(&InitializeRequest {
                reference: "pay-2-abc".to_string(),
                amount: 100,
                email: "ada@example.com".to_string(),
                callback_url: None,
                meta: json!({}),
            })
            .await;

        assert!(matches!(result, Err(GatewayError::Api(message)) if message == "Invalid key"));
    }

    #[tokio::test]
    async fn test_verify_maps_statuses() {
        let gateway = gateway(spawn_paystack().await, SECRET);

        let paid = gateway.verify("paid").await.unwrap();
        assert_eq!(paid.status, GatewayStatus::Success);
        assert_eq!(paid.amount, 500_000);

        assert_eq!(gateway.verify("gone").await.unwrap().status, GatewayStatus::Abandoned);
        assert_eq!(gateway.verify("later").await.unwrap().status, GatewayStatus::Pending);
    }

    #[tokio::test]
    async fn test_transfer_creates_recipient_first() {
        let gateway = gateway(spawn_paystack().await, SECRET);

        let mut request = TransferRequest {
            reference: "wdr-1-abc".to_string(),
            amount: 1_000_000,
            bank_code: "058".to_string(),
            account_no: "0123456789".to_string(),
            account_name: "Ada Obi".to_string(),
            reason: "Trendit withdrawal".to_string(),
        };

        let outcome = gateway.initiate_transfer(&request).await.unwrap();
        assert_eq!(outcome.reference, "wdr-1-abc");
        assert_eq!(outcome.status, TransferStatus::Pending);

        request.account_no = "0000000000".to_string();
        assert!(matches!(
            gateway.initiate_transfer(&request).await,
            Err(GatewayError::Api(_))
        ));
    }

    #[test]
    fn test_webhook_signature() {
        let gateway = gateway("http://unused".to_string(), SECRET);
        let body = br#"{"event":"charge.success","data":{"reference":"pay-1","amount":5000,"status":"success"}}"#;

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sign(SECRET, body)).unwrap());
        assert!(gateway.verify_webhook(&headers, body));

        // Tampered body
        assert!(!gateway.verify_webhook(&headers, br#"{"event":"charge.success"}"#));

        // Signed with another key
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sign("sk_other", body)).unwrap());
        assert!(!gateway.verify_webhook(&headers, body));

        assert!(!gateway.verify_webhook(&HeaderMap::new(), body));
    }

    #[test]
    fn test_parse_webhook_events() {
        let charge = parse_event(
            br#"{"event":"charge.success","data":{"reference":"pay-1","amount":5000,"status":"success"}}"#,
        )
        .unwrap();
        assert_eq!(
            charge,
            WebhookEvent::Charge(Verification {
                reference: "pay-1".to_string(),
                status: GatewayStatus::Success,
                amount: 5000,
            })
        );

        let reversed = parse_event(br#"{"event":"transfer.reversed","data":{"reference":"wdr-1"}}"#).unwrap();
        assert_eq!(
            reversed,
            WebhookEvent::Transfer {
                reference: "wdr-1".to_string(),
                outcome: WithdrawalStatus::Reversed,
            }
        );

        let ignored = parse_event(br#"{"event":"subscription.create","data":{}}"#).unwrap();
        assert_eq!(ignored, WebhookEvent::Ignored("subscription.create".to_string()));

        assert!(parse_event(b"not json").is_err());
        assert!(parse_event(br#"{"event":"transfer.success","data":{}}"#).is_err());
    }
}
