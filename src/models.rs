//! Core data models for the marketplace
//!
//! This module contains the domain entities, the order and transaction
//! state machines, and the audit event record.

use crate::error::MarketError;
use crate::MarketResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order created, no payment held yet
    Pending,
    /// Buyer and seller agreed, payment held
    Confirmed,
    /// Goods delivered / service rendered, payment captured
    Delivered,
    /// Under external dispute resolution
    Disputed,
    /// Order cancelled, any held payment refunded
    Cancelled,
}

impl OrderStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Disputed)
    }

    /// Check if this state allows cancellation
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// Transaction state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction created, gateway hold not yet confirmed
    Pending,
    /// Funds reserved at the gateway, not transferred
    Held,
    /// Held amount captured, transfer completed
    Completed,
    /// Under external dispute resolution
    Disputed,
    /// Hold released, funds returned to the buyer
    Refunded,
}

impl TransactionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded | Self::Disputed)
    }

    /// Check if this state allows capture
    pub fn can_confirm(&self) -> bool {
        matches!(self, Self::Held)
    }

    /// Check if this state allows disputes
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Held | Self::Completed)
    }

    /// Check if this state allows refunds
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Held)
    }
}

/// Reference to exactly one listing: an item or a service.
///
/// Carries the item-XOR-service invariant in the type once the request
/// boundary has validated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingRef {
    Item(Uuid),
    Service(Uuid),
}

impl ListingRef {
    /// Build from optional ids, enforcing that exactly one is present
    pub fn from_ids(item_id: Option<Uuid>, service_id: Option<Uuid>) -> MarketResult<Self> {
        match (item_id, service_id) {
            (Some(id), None) => Ok(Self::Item(id)),
            (None, Some(id)) => Ok(Self::Service(id)),
            (Some(_), Some(_)) => Err(MarketError::validation(
                "Order must reference an item or a service, not both",
            )),
            (None, None) => Err(MarketError::validation(
                "Order must reference an item or a service",
            )),
        }
    }

    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            Self::Item(id) => Some(*id),
            Self::Service(_) => None,
        }
    }

    pub fn service_id(&self) -> Option<Uuid> {
        match self {
            Self::Service(id) => Some(*id),
            Self::Item(_) => None,
        }
    }
}

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub is_seller: bool,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, phone: Option<String>, name: String, is_seller: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            phone,
            name,
            is_seller,
            is_active: true,
            email_verified: false,
            phone_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Item listing owned by a seller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(title: String, description: Option<String>, price: f64, owner_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            price,
            owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Service listing offered by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub provider_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn new(title: String, description: Option<String>, price: f64, provider_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            price,
            provider_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Order linking a buyer to exactly one listing.
///
/// seller_id is always resolved from the listing's owner/provider, never
/// taken from the request. Orders are soft history: never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub listing: ListingRef,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order
    pub fn new(buyer_id: Uuid, seller_id: Uuid, listing: ListingRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            buyer_id,
            seller_id,
            listing,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Validate a status transition
    pub fn validate_transition(&self, to: OrderStatus) -> MarketResult<()> {
        let valid = match (self.status, to) {
            (OrderStatus::Pending, OrderStatus::Confirmed) => true,
            (OrderStatus::Confirmed, OrderStatus::Delivered) => true,
            (from, OrderStatus::Cancelled) => from.can_cancel(),
            // Disputes can be raised from any live state
            (from, OrderStatus::Disputed) => from != OrderStatus::Disputed,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(MarketError::invalid_transition(
                format!("{:?}", self.status),
                format!("{:?}", to),
                "Order transition not allowed".to_string(),
            ))
        }
    }
}

/// Escrow transaction, one-to-one with its order.
///
/// Holds a back-reference to the order for status synchronization; the
/// order exclusively owns its at-most-one transaction. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: f64,
    /// Platform fee as a fraction of amount; recorded, not deducted
    pub platform_fee: f64,
    pub status: TransactionStatus,
    /// External gateway payment reference, set once the hold exists
    pub payment_id: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new pending transaction for an order
    pub fn new(
        order_id: Uuid,
        amount: f64,
        platform_fee: f64,
        payment_method: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount,
            platform_fee,
            status: TransactionStatus::Pending,
            payment_id: None,
            payment_method,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Validate a status transition
    pub fn validate_transition(&self, to: TransactionStatus) -> MarketResult<()> {
        let valid = match (self.status, to) {
            (TransactionStatus::Pending, TransactionStatus::Held) => true,
            (from, TransactionStatus::Completed) => from.can_confirm(),
            (from, TransactionStatus::Disputed) => from.can_dispute(),
            (from, TransactionStatus::Refunded) => from.can_refund(),
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(MarketError::invalid_transition(
                format!("{:?}", self.status),
                format!("{:?}", to),
                "Transaction transition not allowed".to_string(),
            ))
        }
    }
}

/// Escrow event for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub id: Uuid,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub payment_id: Option<String>,
    pub amount: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    /// Immutable
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_ref_requires_exactly_one_id() {
        let item = Uuid::new_v4();
        let service = Uuid::new_v4();

        assert!(matches!(
            ListingRef::from_ids(Some(item), None),
            Ok(ListingRef::Item(_))
        ));
        assert!(matches!(
            ListingRef::from_ids(None, Some(service)),
            Ok(ListingRef::Service(_))
        ));
        assert!(matches!(
            ListingRef::from_ids(Some(item), Some(service)),
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            ListingRef::from_ids(None, None),
            Err(MarketError::Validation(_))
        ));
    }

    #[test]
    fn order_transition_table() {
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), ListingRef::Item(Uuid::new_v4()));

        assert!(order.validate_transition(OrderStatus::Confirmed).is_ok());
        assert!(order.validate_transition(OrderStatus::Cancelled).is_ok());
        assert!(order.validate_transition(OrderStatus::Disputed).is_ok());
        assert!(order.validate_transition(OrderStatus::Delivered).is_err());

        order.status = OrderStatus::Confirmed;
        assert!(order.validate_transition(OrderStatus::Delivered).is_ok());
        assert!(order.validate_transition(OrderStatus::Cancelled).is_ok());

        order.status = OrderStatus::Delivered;
        assert!(order.validate_transition(OrderStatus::Cancelled).is_err());
        assert!(order.validate_transition(OrderStatus::Disputed).is_ok());

        order.status = OrderStatus::Disputed;
        assert!(order.validate_transition(OrderStatus::Disputed).is_err());
    }

    #[test]
    fn transaction_transition_table() {
        let mut txn = Transaction::new(Uuid::new_v4(), 1000.0, 0.05, None);

        assert!(txn.validate_transition(TransactionStatus::Held).is_ok());
        assert!(txn.validate_transition(TransactionStatus::Completed).is_err());
        assert!(txn.validate_transition(TransactionStatus::Refunded).is_err());

        txn.status = TransactionStatus::Held;
        assert!(txn.validate_transition(TransactionStatus::Completed).is_ok());
        assert!(txn.validate_transition(TransactionStatus::Disputed).is_ok());
        assert!(txn.validate_transition(TransactionStatus::Refunded).is_ok());

        txn.status = TransactionStatus::Completed;
        assert!(txn.validate_transition(TransactionStatus::Disputed).is_ok());
        assert!(txn.validate_transition(TransactionStatus::Refunded).is_err());

        txn.status = TransactionStatus::Refunded;
        assert!(txn.status.is_terminal());
    }
}
