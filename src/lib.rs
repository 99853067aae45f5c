//! Escrow-backed order and transaction core for a marketplace backend
//!
//! This crate implements the order/transaction lifecycle of a marketplace:
//! - Users and item/service listings as leaf data providers
//! - An order lifecycle manager that resolves buyer and seller
//! - A transaction/escrow manager that holds and captures payments through
//!   an external payment gateway, keeping order and transaction status in sync
//!
//! HTTP routing, password hashing, token issuance, and message delivery are
//! external collaborators; this crate only orchestrates the domain.

pub mod catalog;
pub mod config;
pub mod error;
pub mod escrow_manager;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod node;
pub mod order_manager;

use error::MarketError;

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
