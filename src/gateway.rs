//! Payment gateway client - hold, capture, and refund operations
//!
//! The escrow manager talks to the payment provider through the
//! [`PaymentGateway`] trait. [`HttpGateway`] implements it over the
//! provider's REST API; [`MockGateway`] is a scriptable in-memory
//! implementation for tests and demos.

use crate::config::GatewayConfig;
use crate::error::MarketError;
use crate::MarketResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Request to reserve funds without transferring them
#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub amount: f64,
    pub currency: String,
    /// Fresh per attempt; the gateway is the source of idempotent dedup
    pub idempotency_key: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a successful hold creation
#[derive(Debug, Clone)]
pub struct HoldReceipt {
    /// Provider-side payment reference, the reconciliation join key
    pub payment_id: String,
    /// URL the buyer must visit to confirm the hold
    pub confirmation_url: Option<String>,
}

/// Provider-side payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Payment created, awaiting buyer confirmation
    Pending,
    /// Funds reserved, capture not yet requested
    WaitingForCapture,
    /// Captured; transfer completed
    Succeeded,
    /// Hold released or refunded
    Canceled,
}

/// External payment provider contract consumed by the escrow manager
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hold (capture=false) and return the payment reference
    async fn create_hold(&self, request: HoldRequest) -> MarketResult<HoldReceipt>;

    /// Capture a previously held amount
    async fn capture(&self, payment_id: &str, amount: f64) -> MarketResult<PaymentState>;

    /// Release a held amount back to the buyer
    async fn refund(&self, payment_id: &str, amount: f64) -> MarketResult<PaymentState>;

    /// Query the provider-side state of a payment (reconciliation)
    async fn get_payment(&self, payment_id: &str) -> MarketResult<PaymentState>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireAmount {
    value: String,
    currency: String,
}

#[derive(Debug, Serialize)]
struct WireConfirmation {
    #[serde(rename = "type")]
    kind: String,
    return_url: String,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody {
    amount: WireAmount,
    capture: bool,
    confirmation: WireConfirmation,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CaptureBody {
    amount: WireAmount,
}

#[derive(Debug, Serialize)]
struct RefundBody {
    payment_id: String,
    amount: WireAmount,
}

#[derive(Debug, Deserialize)]
struct WireConfirmationResponse {
    confirmation_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    status: PaymentState,
    confirmation: Option<WireConfirmationResponse>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    code: Option<String>,
    description: Option<String>,
}

/// Payment gateway client over the provider's REST API
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> MarketResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MarketError::config(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn amount(&self, amount: f64) -> WireAmount {
        WireAmount {
            value: format!("{:.2}", amount),
            currency: self.config.currency.clone(),
        }
    }

    async fn send<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<&B>,
    ) -> MarketResult<PaymentResponse> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key));

        if let Some(key) = idempotency_key {
            request = request.header("Idempotence-Key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketError::timeout(format!("Gateway call to {} timed out", path))
            } else {
                MarketError::gateway("transport".to_string(), e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let err: ProviderError = response.json().await.unwrap_or(ProviderError {
                code: None,
                description: None,
            });
            return Err(MarketError::gateway(
                err.code.unwrap_or_else(|| status.as_u16().to_string()),
                err.description
                    .unwrap_or_else(|| "Gateway request failed".to_string()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| MarketError::gateway("decode".to_string(), e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_hold(&self, request: HoldRequest) -> MarketResult<HoldReceipt> {
        let body = CreatePaymentBody {
            amount: WireAmount {
                value: format!("{:.2}", request.amount),
                currency: request.currency,
            },
            capture: false,
            confirmation: WireConfirmation {
                kind: "redirect".to_string(),
                return_url: self.config.return_url.clone(),
            },
            description: request.description,
            metadata: request.metadata,
        };

        let payment = self
            .send(
                reqwest::Method::POST,
                "/payments",
                Some(&request.idempotency_key),
                Some(&body),
            )
            .await?;

        Ok(HoldReceipt {
            payment_id: payment.id,
            confirmation_url: payment.confirmation.and_then(|c| c.confirmation_url),
        })
    }

    async fn capture(&self, payment_id: &str, amount: f64) -> MarketResult<PaymentState> {
        let key = Uuid::new_v4().to_string();
        let body = CaptureBody {
            amount: self.amount(amount),
        };
        let payment = self
            .send(
                reqwest::Method::POST,
                &format!("/payments/{}/capture", payment_id),
                Some(&key),
                Some(&body),
            )
            .await?;

        Ok(payment.status)
    }

    async fn refund(&self, payment_id: &str, amount: f64) -> MarketResult<PaymentState> {
        let key = Uuid::new_v4().to_string();
        let body = RefundBody {
            payment_id: payment_id.to_string(),
            amount: self.amount(amount),
        };
        let refund = self
            .send(reqwest::Method::POST, "/refunds", Some(&key), Some(&body))
            .await?;

        Ok(refund.status)
    }

    async fn get_payment(&self, payment_id: &str) -> MarketResult<PaymentState> {
        let payment = self
            .send::<()>(
                reqwest::Method::GET,
                &format!("/payments/{}", payment_id),
                None,
                None,
            )
            .await?;

        Ok(payment.status)
    }
}

// ---------------------------------------------------------------------------
// Scriptable in-memory implementation
// ---------------------------------------------------------------------------

/// In-memory gateway for tests and demos.
///
/// Tracks payments by id, records idempotency keys, and can be scripted
/// to fail or stall individual operations.
#[derive(Default)]
pub struct MockGateway {
    payments: tokio::sync::RwLock<std::collections::HashMap<String, PaymentState>>,
    seen_keys: tokio::sync::RwLock<Vec<String>>,
    fail_create: std::sync::atomic::AtomicBool,
    fail_capture: std::sync::atomic::AtomicBool,
    fail_refund: std::sync::atomic::AtomicBool,
    stall: tokio::sync::RwLock<Option<Duration>>,
    capture_calls: std::sync::atomic::AtomicUsize,
    refund_calls: std::sync::atomic::AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent create_hold calls fail
    pub fn fail_create(&self, fail: bool) {
        self.fail_create
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make subsequent capture calls fail
    pub fn fail_capture(&self, fail: bool) {
        self.fail_capture
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make subsequent refund calls fail
    pub fn fail_refund(&self, fail: bool) {
        self.fail_refund
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Delay every subsequent call by the given duration
    pub async fn stall(&self, delay: Option<Duration>) {
        *self.stall.write().await = delay;
    }

    /// Number of capture calls issued so far
    pub fn capture_calls(&self) -> usize {
        self.capture_calls
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of refund calls issued so far
    pub fn refund_calls(&self) -> usize {
        self.refund_calls
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Idempotency keys observed on create_hold, in call order
    pub async fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.read().await.clone()
    }

    /// Force a provider-side state, simulating out-of-band settlement
    pub async fn set_payment_state(&self, payment_id: &str, state: PaymentState) {
        self.payments
            .write()
            .await
            .insert(payment_id.to_string(), state);
    }

    async fn maybe_stall(&self) {
        if let Some(delay) = *self.stall.read().await {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_hold(&self, request: HoldRequest) -> MarketResult<HoldReceipt> {
        self.maybe_stall().await;
        self.seen_keys.write().await.push(request.idempotency_key);

        if self.fail_create.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MarketError::gateway(
                "hold_rejected".to_string(),
                "Provider rejected the hold".to_string(),
            ));
        }

        let payment_id = format!("pay_{}", Uuid::new_v4());
        self.payments
            .write()
            .await
            .insert(payment_id.clone(), PaymentState::WaitingForCapture);

        Ok(HoldReceipt {
            confirmation_url: Some(format!("https://gateway.test/confirm/{}", payment_id)),
            payment_id,
        })
    }

    async fn capture(&self, payment_id: &str, _amount: f64) -> MarketResult<PaymentState> {
        self.capture_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.maybe_stall().await;

        if self.fail_capture.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MarketError::gateway(
                "capture_rejected".to_string(),
                "Provider rejected the capture".to_string(),
            ));
        }

        let mut payments = self.payments.write().await;
        match payments.get_mut(payment_id) {
            Some(state @ PaymentState::WaitingForCapture) => {
                *state = PaymentState::Succeeded;
                Ok(PaymentState::Succeeded)
            }
            Some(state) => Ok(*state),
            None => Err(MarketError::gateway(
                "not_found".to_string(),
                format!("Payment {} not found", payment_id),
            )),
        }
    }

    async fn refund(&self, payment_id: &str, _amount: f64) -> MarketResult<PaymentState> {
        self.refund_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.maybe_stall().await;

        if self.fail_refund.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MarketError::gateway(
                "refund_rejected".to_string(),
                "Provider rejected the refund".to_string(),
            ));
        }

        let mut payments = self.payments.write().await;
        match payments.get_mut(payment_id) {
            Some(state) => {
                *state = PaymentState::Canceled;
                Ok(PaymentState::Canceled)
            }
            None => Err(MarketError::gateway(
                "not_found".to_string(),
                format!("Payment {} not found", payment_id),
            )),
        }
    }

    async fn get_payment(&self, payment_id: &str) -> MarketResult<PaymentState> {
        self.payments
            .read()
            .await
            .get(payment_id)
            .copied()
            .ok_or_else(|| {
                MarketError::gateway(
                    "not_found".to_string(),
                    format!("Payment {} not found", payment_id),
                )
            })
    }
}
