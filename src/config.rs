//! Configuration for the marketplace core
//!
//! Every component takes its configuration struct at construction time;
//! there is no global mutable configuration. `MarketConfig::from_env`
//! layers an optional file under `MARKET_*` environment variables.

use crate::error::MarketError;
use crate::MarketResult;
use serde::Deserialize;

/// Configuration for the order lifecycle manager
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderManagerConfig {
    /// Require the buyer's email to be verified before ordering
    pub require_verified_buyer: bool,
    /// Reject orders where the buyer owns the listing
    pub reject_self_purchase: bool,
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            require_verified_buyer: true,
            reject_self_purchase: true,
        }
    }
}

/// Configuration for the transaction/escrow manager
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Platform fee as a fraction of the transaction amount
    pub platform_fee: f64,
    /// Maximum single transaction amount
    pub max_amount: f64,
    /// ISO currency code recorded on holds
    pub currency: String,
    /// Deadline for each gateway call, in seconds
    pub gateway_timeout_secs: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            platform_fee: 0.05,
            max_amount: 1_000_000.0,
            currency: "RUB".to_string(),
            gateway_timeout_secs: 30,
        }
    }
}

/// Configuration for the HTTP payment gateway client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the payment provider API
    pub api_url: String,
    /// Shop account identifier used for basic auth
    pub shop_id: String,
    /// Shop secret key used for basic auth
    pub secret_key: String,
    /// ISO currency code for charges
    pub currency: String,
    /// Return URL embedded in hold confirmations
    pub return_url: String,
    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.yookassa.ru/v3".to_string(),
            shop_id: String::new(),
            secret_key: String::new(),
            currency: "RUB".to_string(),
            return_url: "https://example.com/payment/return".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Top-level configuration injected into [`crate::node::MarketNode`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub order: OrderManagerConfig,
    pub escrow: EscrowConfig,
    pub gateway: GatewayConfig,
}

impl MarketConfig {
    /// Load configuration from `MARKET_*` environment variables layered
    /// over an optional config file (e.g. `market.toml`).
    pub fn from_env(file: Option<&str>) -> MarketResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder
            .add_source(config::Environment::with_prefix("MARKET").separator("__"))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| MarketError::config(e.to_string()))
    }
}
