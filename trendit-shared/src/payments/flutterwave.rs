//! Flutterwave client
//!
//! Flutterwave works in major units (naira), so amounts are converted on the way out and
//! back. Our payment reference is sent as `tx_ref`. Webhooks carry the dashboard secret
//! hash verbatim in the `verif-hash` header.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{
    constant_time_eq, to_major_units, to_minor_units, GatewayError, GatewayStatus,
    InitializeRequest, InitializedPayment, PaymentGateway, TransferOutcome, TransferRequest,
    TransferStatus, Verification, WebhookEvent,
};
use crate::models::payment::PaymentMethod;
use crate::models::withdrawal::WithdrawalStatus;

pub const SIGNATURE_HEADER: &str = "verif-hash";

pub struct FlutterwaveGateway {
    http: reqwest::Client,
    secret_key: String,
    secret_hash: String,
    base_url: String,
    currency: String,
}

/// `{status: "success" | "error", message, data}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    link: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    tx_ref: String,
    status: String,
    amount: f64,
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
    tx_ref: Option<String>,
    reference: Option<String>,
    status: Option<String>,
    amount: Option<f64>,
}

impl FlutterwaveGateway {
    pub fn new(
        http: reqwest::Client,
        secret_key: String,
        secret_hash: String,
        base_url: String,
        currency: String,
    ) -> Self {
        Self {
            http,
            secret_key,
            secret_hash,
            base_url: base_url.trim_end_matches('/').to_string(),
            currency,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let http_status = response.status();
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(format!("HTTP {}: {}", http_status, e)))?;

    if envelope.status != "success" {
        return Err(GatewayError::Api(envelope.message));
    }

    envelope
        .data
        .ok_or_else(|| GatewayError::InvalidResponse("response has no data".to_string()))
}

fn charge_status(status: &str) -> GatewayStatus {
    match status.to_lowercase().as_str() {
        "successful" => GatewayStatus::Success,
        "failed" => GatewayStatus::Failed,
        "cancelled" => GatewayStatus::Abandoned,
        _ => GatewayStatus::Pending,
    }
}

fn transfer_status(status: &str) -> TransferStatus {
    match status.to_uppercase().as_str() {
        "SUCCESSFUL" => TransferStatus::Success,
        "FAILED" => TransferStatus::Failed,
        _ => TransferStatus::Pending,
    }
}

fn parse_event(body: &[u8]) -> Result<WebhookEvent, GatewayError> {
    let webhook: WebhookBody = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("invalid webhook body: {}", e)))?;
    let data = webhook.data;

    let event = match webhook.event.as_str() {
        "charge.completed" => WebhookEvent::Charge(Verification {
            reference: data
                .tx_ref
                .ok_or_else(|| GatewayError::InvalidResponse("webhook has no tx_ref".to_string()))?,
            status: charge_status(data.status.as_deref().unwrap_or_default()),
            amount: to_minor_units(data.amount.unwrap_or_default()),
        }),
        "transfer.completed" => {
            let reference = data
                .reference
                .ok_or_else(|| GatewayError::InvalidResponse("webhook has no reference".to_string()))?;
            match transfer_status(data.status.as_deref().unwrap_or_default()) {
                TransferStatus::Success => WebhookEvent::Transfer {
                    reference,
                    outcome: WithdrawalStatus::Completed,
                },
                TransferStatus::Failed => WebhookEvent::Transfer {
                    reference,
                    outcome: WithdrawalStatus::Failed,
                },
                TransferStatus::Pending => WebhookEvent::Ignored("transfer.completed".to_string()),
            }
        }
        other => WebhookEvent::Ignored(other.to_string()),
    };

    Ok(event)
}

#[async_trait]
impl PaymentGateway for FlutterwaveGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Flutterwave
    }

    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError> {
        let response = self
            .http
            .post(self.url("/v3/payments"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "tx_ref": request.reference,
                "amount": to_major_units(request.amount),
                "currency": self.currency,
                "redirect_url": request.callback_url,
                "meta": request.meta,
                "customer": { "email": request.email },
                "customizations": { "title": "Trendit³" },
            }))
            .send()
            .await?;

        let data: PaymentLink = read_envelope(response).await?;

        tracing::info!(reference = %request.reference, "Flutterwave payment initialized");

        Ok(InitializedPayment {
            authorization_url: data.link,
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .http
            .get(self.url("/v3/transactions/verify_by_reference"))
            .query(&[("tx_ref", reference)])
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let data: TransactionData = read_envelope(response).await?;

        Ok(Verification {
            reference: data.tx_ref,
            status: charge_status(&data.status),
            amount: to_minor_units(data.amount),
        })
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, GatewayError> {
        let response = self
            .http
            .post(self.url("/v3/transfers"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "account_bank": request.bank_code,
                "account_number": request.account_no,
                "amount": to_major_units(request.amount),
                "narration": request.reason,
                "currency": self.currency,
                "debit_currency": self.currency,
                "reference": request.reference,
            }))
            .send()
            .await?;

        let data: TransferData = read_envelope(response).await?;

        tracing::info!(reference = %data.reference, status = %data.status, "Flutterwave transfer requested");

        Ok(TransferOutcome {
            reference: data.reference,
            status: transfer_status(&data.status),
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, _body: &[u8]) -> bool {
        headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|hash| constant_time_eq(hash.as_bytes(), self.secret_hash.as_bytes()))
            .unwrap_or(false)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        parse_event(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::HeaderValue,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::Value;
    use std::collections::HashMap;

    async fn spawn_flutterwave() -> String {
        let app = Router::new()
            .route(
                "/v3/payments",
                post(|Json(body): Json<Value>| async move {
                    // Major units on the wire
                    assert_eq!(body["amount"], json!(2500.5));
                    Json(json!({
                        "status": "success",
                        "message": "Hosted Link",
                        "data": { "link": format!("https://checkout.flutterwave.com/{}", body["tx_ref"].as_str().unwrap_or_default()) }
                    }))
                }),
            )
            .route(
                "/v3/transactions/verify_by_reference",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    let tx_ref = query.get("tx_ref").cloned().unwrap_or_default();
                    if tx_ref == "missing" {
                        return Json(json!({"status": "error", "message": "No transaction was found", "data": null}));
                    }
                    Json(json!({
                        "status": "success",
                        "message": "Transaction fetched successfully",
                        "data": { "tx_ref": tx_ref, "status": "successful", "amount": 2500.5 }
                    }))
                }),
            )
            .route(
                "/v3/transfers",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "status": "success",
                        "message": "Transfer Queued Successfully",
                        "data": { "id": 1, "reference": body["reference"], "status": "NEW" }
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

    fn gateway(base_url: String) -> FlutterwaveGateway {
        FlutterwaveGateway::new(
            reqwest::Client::new(),
            "FLWSECK_TEST-xxx".to_string(),
            "trendit-hash".to_string(),
            base_url,
            "NGN".to_string(),
        )
    }

    #[tokio::test]
    async fn test_initialize_converts_to_major_units() {
        let gateway = gateway(spawn_flutterwave().await);

        let initialized = gateway
            .initialize(&InitializeRequest {
                reference: "pay-1-abc".to_string(),
                amount: 250_050,
                email: "ada@example.com".to_string(),
                callback_url: Some("https://app.trendit3.com/cb".to_string()),
                meta: json!({}),
            })
            .await
            .unwrap();

        assert_eq!(initialized.authorization_url, "https://checkout.flutterwave.com/pay-1-abc");
        assert_eq!(initialized.reference, "pay-1-abc");
    }

    #[tokio::test]
    async fn test_verify_by_reference() {
        let gateway = gateway(spawn_flutterwave().await);

        let verification = gateway.verify("pay-1-abc").await.unwrap();
        assert_eq!(verification.reference, "pay-1-abc");
        assert_eq!(verification.status, GatewayStatus::Success);
        assert_eq!(verification.amount, 250_050);

        assert!(matches!(gateway.verify("missing").await, Err(GatewayError::Api(_))));
    }

    #[tokio::test]
    async fn test_transfer_is_pending_until_webhook() {
        let gateway = gateway(spawn_flutterwave().await);

        let outcome = gateway
            .initiate_transfer(&TransferRequest {
                reference: "wdr-1-abc".to_string(),
                amount: 1_000_000,
                bank_code: "044".to_string(),
                account_no: "0690000040".to_string(),
                account_name: "Ada Obi".to_string(),
                reason: "Trendit withdrawal".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, TransferStatus::Pending);
        assert_eq!(outcome.reference, "wdr-1-abc");
    }

    #[test]
    fn test_webhook_hash() {
        let gateway = gateway("http://unused".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("trendit-hash"));
        assert!(gateway.verify_webhook(&headers, b"{}"));

        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("forged"));
        assert!(!gateway.verify_webhook(&headers, b"{}"));

        assert!(!gateway.verify_webhook(&HeaderMap::new(), b"{}"));
    }

    #[test]
    fn test_parse_webhook_events() {
        let charge = parse_event(
            br#"{"event":"charge.completed","data":{"tx_ref":"pay-1","amount":100.25,"status":"successful"}}"#,
        )
        .unwrap();
        assert_eq!(
            charge,
            WebhookEvent::Charge(Verification {
                reference: "pay-1".to_string(),
                status: GatewayStatus::Success,
                amount: 10_025,
            })
        );

        let failed_transfer = parse_event(
            br#"{"event":"transfer.completed","data":{"reference":"wdr-1","status":"FAILED"}}"#,
        )
        .unwrap();
        assert_eq!(
            failed_transfer,
            WebhookEvent::Transfer {
                reference: "wdr-1".to_string(),
                outcome: WithdrawalStatus::Failed,
            }
        );

        assert!(matches!(
            parse_event(br#"{"event":"subscription.cancelled","data":{}}"#).unwrap(),
            WebhookEvent::Ignored(_)
        ));
    }
}
