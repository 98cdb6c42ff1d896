//! In-memory gateway for tests and local development
//!
//! Records every request it receives and answers from a scripted table. Webhooks use the
//! Paystack wire format and signature, keyed with the mock's secret.
//!
//! # Example
//!
//! ```
//! use trendit_shared::payments::{GatewayStatus, MockGateway, PaymentGateway};
//!
//! # async fn example() {
//! let gateway = MockGateway::new("whsec_test");
//! gateway.set_verification("pay-1", GatewayStatus::Success, 50_000);
//!
//! let verification = gateway.verify("pay-1").await.unwrap();
//! assert_eq!(verification.amount, 50_000);
//! # }
//! ```

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{
    paystack, GatewayError, GatewayStatus, InitializeRequest, InitializedPayment,
    PaymentGateway, TransferOutcome, TransferRequest, TransferStatus, Verification, WebhookEvent,
};
use crate::models::payment::PaymentMethod;

pub struct MockGateway {
    secret: String,
    verifications: Mutex<HashMap<String, Verification>>,
    initialized: Mutex<Vec<InitializeRequest>>,
    transfers: Mutex<Vec<TransferRequest>>,
    fail_initialize: AtomicBool,
    fail_transfer: AtomicBool,
    lose_transfer_response: AtomicBool,
}

impl MockGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            verifications: Mutex::new(HashMap::new()),
            initialized: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            fail_initialize: AtomicBool::new(false),
            fail_transfer: AtomicBool::new(false),
            lose_transfer_response: AtomicBool::new(false),
        }
    }

    /// Scripts the answer `verify(reference)` will give
    pub fn set_verification(&self, reference: &str, status: GatewayStatus, amount: i64) {
        if let Ok(mut verifications) = self.verifications.lock() {
            verifications.insert(
                reference.to_string(),
                Verification {
                    reference: reference.to_string(),
                    status,
                    amount,
                },
            );
        }
    }

    /// Makes `initialize` reject every request
    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Makes `initiate_transfer` reject every request
    pub fn fail_transfer(&self, fail: bool) {
        self.fail_transfer.store(fail, Ordering::SeqCst);
    }

    /// Makes `initiate_transfer` accept the transfer but answer with a gateway timeout,
    /// as a provider does when its response is lost in transit
    pub fn lose_transfer_response(&self, lose: bool) {
        self.lose_transfer_response.store(lose, Ordering::SeqCst);
    }

    pub fn initialized(&self) -> Vec<InitializeRequest> {
        self.initialized.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Signature header value a real delivery of `body` would carry
    pub fn sign(&self, body: &[u8]) -> String {
        paystack::sign(&self.secret, body)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Api("Initialization declined".to_string()));
        }

        if let Ok(mut initialized) = self.initialized.lock() {
            initialized.push(request.clone());
        }

        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.mock/{}", request.reference),
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let scripted = self
            .verifications
            .lock()
            .ok()
            .and_then(|v| v.get(reference).cloned());

        Ok(scripted.unwrap_or_else(|| Verification {
            reference: reference.to_string(),
            status: GatewayStatus::Pending,
            amount: 0,
        }))
    }

    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, GatewayError> {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(GatewayError::Api("Transfer declined".to_string()));
        }

        if let Ok(mut transfers) = self.transfers.lock() {
            transfers.push(request.clone());
        }

        if self.lose_transfer_response.load(Ordering::SeqCst) {
            return Err(GatewayError::InvalidResponse("HTTP 504 Gateway Timeout".to_string()));
        }

        Ok(TransferOutcome {
            reference: request.reference.clone(),
            status: TransferStatus::Pending,
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        paystack::signature_matches(&self.secret, headers, body)
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        paystack::parse_event(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_unscripted_reference_is_pending() {
        let gateway = MockGateway::new("whsec");
        let verification = gateway.verify("pay-unknown").await.unwrap();
        assert_eq!(verification.status, GatewayStatus::Pending);
    }

    #[tokio::test]
    async fn test_records_transfers_and_failures() {
        let gateway = MockGateway::new("whsec");
        let request = TransferRequest {
            reference: "wdr-1".to_string(),
            amount: 20_000,
            bank_code: "058".to_string(),
            account_no: "0123456789".to_string(),
            account_name: "Ada Obi".to_string(),
            reason: "payout".to_string(),
        };

        gateway.initiate_transfer(&request).await.unwrap();
        assert_eq!(gateway.transfers().len(), 1);

        gateway.fail_transfer(true);
        assert!(gateway.initiate_transfer(&request).await.is_err());
        assert_eq!(gateway.transfers().len(), 1);

        gateway.fail_transfer(false);
        gateway.lose_transfer_response(true);
        assert!(matches!(
            gateway.initiate_transfer(&request).await,
            Err(GatewayError::InvalidResponse(_))
        ));
        assert_eq!(gateway.transfers().len(), 2);
    }

    #[test]
    fn test_webhook_uses_paystack_signature() {
        let gateway = MockGateway::new("whsec");
        let body = br#"{"event":"charge.success","data":{"reference":"pay-1","amount":100}}"#;

        let mut headers = HeaderMap::new();
        headers.insert(
            paystack::SIGNATURE_HEADER,
            HeaderValue::from_str(&gateway.sign(body)).unwrap(),
        );

        assert!(gateway.verify_webhook(&headers, body));
        assert!(matches!(
            gateway.parse_webhook(body).unwrap(),
            WebhookEvent::Charge(_)
        ));
    }
}
