//! Error types for the marketplace core
//!
//! One taxonomy for all order, transaction, store, and gateway operations.
//! Every error is returned to the caller untouched; the core never swallows
//! a gateway failure or a state conflict.

use thiserror::Error;

/// Main error type for marketplace operations
#[derive(Error, Debug)]
pub enum MarketError {
    /// Malformed input (e.g. both item_id and service_id supplied)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced user/item/service/order/transaction absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate resource (e.g. second transaction for an order)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation not legal in the entity's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Disallowed status transition
    #[error("Invalid transition: {from} -> {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// External payment provider failure, wraps the provider code
    #[error("Gateway error [{code}]: {message}")]
    Gateway { code: String, message: String },

    /// Gateway call exceeded its deadline; treated as failure, never success
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create an invalid-transition error
    pub fn invalid_transition<S: Into<String>>(from: S, to: S, reason: S) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    /// Create a gateway error with a provider-specific code
    pub fn gateway<S: Into<String>>(code: S, message: S) -> Self {
        Self::Gateway {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}
