//! Order Lifecycle Manager
//!
//! Creates orders linking a buyer to exactly one listing, resolves the
//! seller from the catalog, and applies status transitions. Orders are
//! mutated only through this manager and never deleted.

use crate::catalog::CatalogStore;
use crate::config::OrderManagerConfig;
use crate::error::MarketError;
use crate::identity::IdentityStore;
use crate::models::{ListingRef, Order, OrderStatus};
use crate::MarketResult;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Order creation request
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub buyer_id: Uuid,
    pub item_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
}

/// Manages the order lifecycle
pub struct OrderManager {
    config: OrderManagerConfig,
    /// In-memory order storage (a database in production)
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    identity: Arc<IdentityStore>,
    catalog: Arc<CatalogStore>,
}

impl OrderManager {
    pub fn new(
        config: OrderManagerConfig,
        identity: Arc<IdentityStore>,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        Self {
            config,
            orders: Arc::new(RwLock::new(HashMap::new())),
            identity,
            catalog,
        }
    }

    /// Create a new order.
    ///
    /// Exactly one of item_id/service_id must be supplied. The seller is
    /// always resolved from the listing's owner, never taken from the
    /// request. The order starts in `Pending`.
    pub async fn create_order(&self, request: CreateOrderRequest) -> MarketResult<Order> {
        let listing = ListingRef::from_ids(request.item_id, request.service_id)?;

        let buyer = self.identity.get_user(request.buyer_id).await?;
        if !buyer.is_active {
            return Err(MarketError::validation("Buyer account is deactivated"));
        }
        if self.config.require_verified_buyer && !buyer.email_verified {
            return Err(MarketError::validation(
                "Buyer email must be verified before ordering",
            ));
        }

        let resolved = self.catalog.resolve_listing(listing).await?;
        if self.config.reject_self_purchase && resolved.owner_id == buyer.id {
            return Err(MarketError::validation(
                "Buyer cannot order their own listing",
            ));
        }

        let order = Order::new(buyer.id, resolved.owner_id, listing);
        self.orders.write().await.insert(order.id, order.clone());

        info!(
            "Created order {} (buyer: {}, seller: {})",
            order.id, order.buyer_id, order.seller_id
        );

        Ok(order)
    }

    /// Apply a status transition to an order.
    ///
    /// Disallowed targets fail with `InvalidTransition` and leave the
    /// order untouched.
    pub async fn transition_order(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> MarketResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| MarketError::not_found(format!("Order {} not found", order_id)))?;

        order.validate_transition(target)?;
        order.status = target;
        order.updated_at = Utc::now();

        info!("Order {} -> {:?}", order_id, target);

        Ok(order.clone())
    }

    /// Get an order by ID
    pub async fn get_order(&self, order_id: Uuid) -> MarketResult<Order> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("Order {} not found", order_id)))
    }

    /// Get all orders where the user is buyer or seller
    pub async fn orders_for_user(&self, user_id: Uuid) -> MarketResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|order| order.buyer_id == user_id || order.seller_id == user_id)
            .cloned()
            .collect())
    }

    /// Shared handle to the order map, for the escrow manager's atomic
    /// cascades. Lock order is always transactions before orders.
    pub(crate) fn store(&self) -> Arc<RwLock<HashMap<Uuid, Order>>> {
        Arc::clone(&self.orders)
    }
}
