//! Payment gateway clients
//!
//! Trendit talks to one gateway at a time, selected by `PAYMENT_GATEWAY`. Both gateways
//! sit behind the [`PaymentGateway`] trait so the API, the worker and settlement never
//! branch on the provider.
//!
//! Amounts crossing this trait are always minor units (kobo). Each client converts to
//! whatever its provider expects.
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::payments::{build_gateway, GatewayConfig, InitializeRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = build_gateway(&GatewayConfig::from_env()?)?;
//!
//! let initialized = gateway
//!     .initialize(&InitializeRequest {
//!         reference: "pay-1700000000-AbCdEfGhIjKl".to_string(),
//!         amount: 250_000,
//!         email: "ada@example.com".to_string(),
//!         callback_url: Some("https://app.trendit3.com/payment/callback".to_string()),
//!         meta: serde_json::json!({ "payment_type": "credit-wallet" }),
//!     })
//!     .await?;
//!
//! println!("redirect the user to {}", initialized.authorization_url);
//! # Ok(())
//! # }
//! ```

pub mod flutterwave;
pub mod mock;
pub mod paystack;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::models::payment::PaymentMethod;
use crate::models::withdrawal::WithdrawalStatus;

pub use flutterwave::FlutterwaveGateway;
pub use mock::MockGateway;
pub use paystack::PaystackGateway;

/// Gateway client errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered but refused the request
    #[error("Gateway rejected the request: {0}")]
    Api(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),
}

/// Payment status as reported by a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Success,
    Failed,
    Abandoned,
    Pending,
}

/// Parameters for starting a hosted checkout
#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    /// Our payment reference, reused as the gateway reference
    pub reference: String,

    /// Minor units
    pub amount: i64,

    pub email: String,
    pub callback_url: Option<String>,
    pub meta: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

/// A gateway's account of a payment, from `verify` or from a webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub reference: String,
    pub status: GatewayStatus,

    /// Amount actually charged, minor units
    pub amount: i64,
}

/// Parameters for a bank payout
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Withdrawal reference, reused as the gateway transfer reference
    pub reference: String,

    /// Minor units
    pub amount: i64,

    pub bank_code: String,
    pub account_no: String,
    pub account_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub reference: String,
    pub status: TransferStatus,
}

/// A webhook delivery, already authenticated and parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A charge reached a final state
    Charge(Verification),

    /// A payout reached a final state
    Transfer {
        reference: String,
        outcome: WithdrawalStatus,
    },

    /// Any event Trendit does not act on; carries the event name
    Ignored(String),
}

/// A payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Method recorded on payments created through this gateway
    fn method(&self) -> PaymentMethod;

    /// Starts a hosted checkout and returns the URL to send the payer to
    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError>;

    /// Asks the gateway for the current state of a payment
    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;

    /// Requests a payout to a bank account
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, GatewayError>;

    /// Checks the delivery signature against the raw request body
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool;

    /// Parses a verified webhook body
    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent, GatewayError>;
}

/// Gateway selection and credentials
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: PaymentMethod,
    pub paystack_secret_key: Option<String>,
    pub paystack_base_url: String,
    pub flw_secret_key: Option<String>,
    pub flw_secret_hash: Option<String>,
    pub flw_base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub const DEFAULT_PAYSTACK_BASE_URL: &'static str = "https://api.paystack.co";
    pub const DEFAULT_FLW_BASE_URL: &'static str = "https://api.flutterwave.com";

    /// Reads the gateway settings from the environment
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` if `PAYMENT_GATEWAY` names an unknown provider.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let provider = match env::var("PAYMENT_GATEWAY")
            .unwrap_or_else(|_| "paystack".to_string())
            .to_lowercase()
            .as_str()
        {
            "paystack" => PaymentMethod::Paystack,
            "flutterwave" => PaymentMethod::Flutterwave,
            other => {
                return Err(GatewayError::NotConfigured(format!(
                    "unsupported PAYMENT_GATEWAY '{}'",
                    other
                )))
            }
        };

        let optional = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            provider,
            paystack_secret_key: optional("PAYSTACK_SECRET_KEY"),
            paystack_base_url: optional("PAYSTACK_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_PAYSTACK_BASE_URL.to_string()),
            flw_secret_key: optional("FLW_SECRET_KEY"),
            flw_secret_hash: optional("FLW_SECRET_HASH"),
            flw_base_url: optional("FLW_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_FLW_BASE_URL.to_string()),
            currency: optional("PAYMENT_CURRENCY").unwrap_or_else(|| "NGN".to_string()),
            timeout_secs: optional("PAYMENT_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

/// Builds the configured gateway client
///
/// # Errors
///
/// Returns `NotConfigured` when the selected provider's secrets are missing.
pub fn build_gateway(config: &GatewayConfig) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    match config.provider {
        PaymentMethod::Paystack => {
            let secret_key = config.paystack_secret_key.clone().ok_or_else(|| {
                GatewayError::NotConfigured("PAYSTACK_SECRET_KEY is required".to_string())
            })?;
            Ok(Arc::new(PaystackGateway::new(
                http,
                secret_key,
                config.paystack_base_url.clone(),
                config.currency.clone(),
            )))
        }
        PaymentMethod::Flutterwave => {
            let secret_key = config.flw_secret_key.clone().ok_or_else(|| {
                GatewayError::NotConfigured("FLW_SECRET_KEY is required".to_string())
            })?;
            let secret_hash = config.flw_secret_hash.clone().ok_or_else(|| {
                GatewayError::NotConfigured("FLW_SECRET_HASH is required".to_string())
            })?;
            Ok(Arc::new(FlutterwaveGateway::new(
                http,
                secret_key,
                secret_hash,
                config.flw_base_url.clone(),
                config.currency.clone(),
            )))
        }
        PaymentMethod::Wallet => Err(GatewayError::NotConfigured(
            "the wallet is not a gateway".to_string(),
        )),
    }
}

/// Converts minor units to the decimal major amount some providers expect
pub(crate) fn to_major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

/// Converts a decimal major amount back to minor units
pub(crate) fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Byte comparison whose running time does not depend on where inputs differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversion() {
        assert_eq!(to_major_units(250_050), 2500.5);
        assert_eq!(to_minor_units(2500.5), 250_050);
        assert_eq!(to_minor_units(19.99), 1999);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_build_gateway_requires_secret() {
        let config = GatewayConfig {
            provider: PaymentMethod::Paystack,
            paystack_secret_key: None,
            paystack_base_url: GatewayConfig::DEFAULT_PAYSTACK_BASE_URL.to_string(),
            flw_secret_key: None,
            flw_secret_hash: None,
            flw_base_url: GatewayConfig::DEFAULT_FLW_BASE_URL.to_string(),
            currency: "NGN".to_string(),
            timeout_secs: 5,
        };

        assert!(matches!(
            build_gateway(&config),
            Err(GatewayError::NotConfigured(_))
        ));

        let config = GatewayConfig {
            paystack_secret_key: Some("sk_test_xxx".to_string()),
            ..config
        };
        let gateway = build_gateway(&config).unwrap();
        assert_eq!(gateway.method(), PaymentMethod::Paystack);
    }
}
