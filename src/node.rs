//! Market Node - High-level API for the marketplace core
//!
//! Wires the identity store, catalog store, order manager, escrow manager,
//! and payment gateway into one object and exposes the operations the
//! surrounding API layer maps to endpoints.

use crate::catalog::{AddItemRequest, AddServiceRequest, CatalogStore, ResolvedListing};
use crate::config::MarketConfig;
use crate::escrow_manager::{EscrowManager, HoldOutcome, InitiateHoldRequest};
use crate::gateway::{HttpGateway, PaymentGateway};
use crate::identity::{IdentityStore, RegisterUserRequest};
use crate::models::{EscrowEvent, Item, Order, OrderStatus, Service, Transaction, User};
use crate::order_manager::{CreateOrderRequest, OrderManager};
use crate::MarketResult;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Main node that coordinates all components
pub struct MarketNode {
    identity: Arc<IdentityStore>,
    catalog: Arc<CatalogStore>,
    orders: Arc<OrderManager>,
    escrow: Arc<EscrowManager>,
}

impl MarketNode {
    /// Create a node with an explicit gateway implementation
    pub fn new(config: MarketConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let identity = Arc::new(IdentityStore::new());
        let catalog = Arc::new(CatalogStore::new(identity.clone()));
        let orders = Arc::new(OrderManager::new(
            config.order,
            identity.clone(),
            catalog.clone(),
        ));
        let escrow = Arc::new(EscrowManager::new(config.escrow, gateway, orders.clone()));

        info!("Market node initialized");

        Self {
            identity,
            catalog,
            orders,
            escrow,
        }
    }

    /// Create a node backed by the HTTP payment gateway
    pub fn from_config(config: MarketConfig) -> MarketResult<Self> {
        let gateway = Arc::new(HttpGateway::new(config.gateway.clone())?);
        Ok(Self::new(config, gateway))
    }

    // --- identity ---

    pub async fn register_user(&self, request: RegisterUserRequest) -> MarketResult<User> {
        self.identity.register_user(request).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> MarketResult<User> {
        self.identity.get_user(user_id).await
    }

    pub async fn mark_email_verified(&self, user_id: Uuid) -> MarketResult<User> {
        self.identity.mark_email_verified(user_id).await
    }

    // --- catalog ---

    pub async fn add_item(&self, request: AddItemRequest) -> MarketResult<Item> {
        self.catalog.add_item(request).await
    }

    pub async fn add_service(&self, request: AddServiceRequest) -> MarketResult<Service> {
        self.catalog.add_service(request).await
    }

    pub async fn search_listings(&self, query: &str) -> MarketResult<Vec<ResolvedListing>> {
        self.catalog.search(query).await
    }

    // --- orders ---

    pub async fn create_order(&self, request: CreateOrderRequest) -> MarketResult<Order> {
        self.orders.create_order(request).await
    }

    pub async fn transition_order(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> MarketResult<Order> {
        self.orders.transition_order(order_id, target).await
    }

    pub async fn get_order(&self, order_id: Uuid) -> MarketResult<Order> {
        self.orders.get_order(order_id).await
    }

    pub async fn orders_for_user(&self, user_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders.orders_for_user(user_id).await
    }

    // --- escrow ---

    pub async fn initiate_hold(&self, request: InitiateHoldRequest) -> MarketResult<HoldOutcome> {
        self.escrow.initiate_hold(request).await
    }

    pub async fn confirm_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        self.escrow.confirm_transaction(transaction_id).await
    }

    pub async fn dispute_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        self.escrow.dispute_transaction(transaction_id).await
    }

    pub async fn refund_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        self.escrow.refund_transaction(transaction_id).await
    }

    pub async fn reconcile_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        self.escrow.reconcile_transaction(transaction_id).await
    }

    pub async fn transaction_for_order(&self, order_id: Uuid) -> MarketResult<Transaction> {
        self.escrow.transaction_for_order(order_id).await
    }

    pub async fn events_for_order(&self, order_id: Uuid) -> MarketResult<Vec<EscrowEvent>> {
        self.escrow.events_for_order(order_id).await
    }

    // --- component access for advanced callers ---

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn order_manager(&self) -> &Arc<OrderManager> {
        &self.orders
    }

    pub fn escrow_manager(&self) -> &Arc<EscrowManager> {
        &self.escrow
    }
}
