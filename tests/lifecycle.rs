//! End-to-end lifecycle tests over the market node with a mock gateway.

use marketplace_engine::catalog::{AddItemRequest, AddServiceRequest};
use marketplace_engine::config::MarketConfig;
use marketplace_engine::error::MarketError;
use marketplace_engine::escrow_manager::InitiateHoldRequest;
use marketplace_engine::gateway::{MockGateway, PaymentGateway};
use marketplace_engine::identity::RegisterUserRequest;
use marketplace_engine::models::{OrderStatus, TransactionStatus};
use marketplace_engine::node::MarketNode;
use marketplace_engine::order_manager::CreateOrderRequest;
use std::sync::Arc;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Harness {
    node: MarketNode,
    gateway: Arc<MockGateway>,
}

fn harness() -> Harness {
    init_tracing();
    let gateway = Arc::new(MockGateway::new());
    let node = MarketNode::new(
        MarketConfig::default(),
        gateway.clone() as Arc<dyn PaymentGateway>,
    );
    Harness { node, gateway }
}

async fn verified_buyer(node: &MarketNode) -> Uuid {
    let buyer = node
        .register_user(RegisterUserRequest {
            email: format!("buyer-{}@example.com", Uuid::new_v4()),
            phone: Some("+79990000000".to_string()),
            name: "Buyer".to_string(),
            is_seller: false,
        })
        .await
        .unwrap();
    node.mark_email_verified(buyer.id).await.unwrap();
    buyer.id
}

async fn seller_with_item(node: &MarketNode, price: f64) -> (Uuid, Uuid) {
    let seller = node
        .register_user(RegisterUserRequest {
            email: format!("seller-{}@example.com", Uuid::new_v4()),
            phone: None,
            name: "Seller".to_string(),
            is_seller: true,
        })
        .await
        .unwrap();
    let item = node
        .add_item(AddItemRequest {
            title: "Samovar".to_string(),
            description: Some("Antique".to_string()),
            price,
            owner_id: seller.id,
        })
        .await
        .unwrap();
    (seller.id, item.id)
}

#[tokio::test]
async fn purchase_happy_path() {
    let h = harness();
    let buyer = verified_buyer(&h.node).await;
    let (seller, item) = seller_with_item(&h.node, 2500.0).await;

    let order = h
        .node
        .create_order(CreateOrderRequest {
            buyer_id: buyer,
            item_id: Some(item),
            service_id: None,
        })
        .await
        .unwrap();
    assert_eq!(order.seller_id, seller);
    assert_eq!(order.status, OrderStatus::Pending);

    let outcome = h
        .node
        .initiate_hold(InitiateHoldRequest {
            order_id: order.id,
            amount: 2500.0,
            payment_method: Some("bank_card".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(outcome.transaction.status, TransactionStatus::Held);
    assert!(outcome.confirmation_url.is_some());
    assert_eq!(
        h.node.get_order(order.id).await.unwrap().status,
        OrderStatus::Confirmed
    );

    let transaction = h
        .node
        .confirm_transaction(outcome.transaction.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(
        h.node.get_order(order.id).await.unwrap().status,
        OrderStatus::Delivered
    );

    let events = h.node.events_for_order(order.id).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn service_booking_with_refund() {
    let h = harness();
    let buyer = verified_buyer(&h.node).await;
    let provider = h
        .node
        .register_user(RegisterUserRequest {
            email: "provider@example.com".to_string(),
            phone: None,
            name: "Provider".to_string(),
            is_seller: true,
        })
        .await
        .unwrap();
    let service = h
        .node
        .add_service(AddServiceRequest {
            title: "Apartment cleaning".to_string(),
            description: None,
            price: 700.0,
            provider_id: provider.id,
        })
        .await
        .unwrap();

    let order = h
        .node
        .create_order(CreateOrderRequest {
            buyer_id: buyer,
            item_id: None,
            service_id: Some(service.id),
        })
        .await
        .unwrap();
    assert_eq!(order.seller_id, provider.id);

    let outcome = h
        .node
        .initiate_hold(InitiateHoldRequest {
            order_id: order.id,
            amount: 700.0,
            payment_method: None,
        })
        .await
        .unwrap();

    let transaction = h
        .node
        .refund_transaction(outcome.transaction.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Refunded);
    assert_eq!(
        h.node.get_order(order.id).await.unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn dispute_freezes_both_entities() {
    let h = harness();
    let buyer = verified_buyer(&h.node).await;
    let (_, item) = seller_with_item(&h.node, 900.0).await;

    let order = h
        .node
        .create_order(CreateOrderRequest {
            buyer_id: buyer,
            item_id: Some(item),
            service_id: None,
        })
        .await
        .unwrap();
    let outcome = h
        .node
        .initiate_hold(InitiateHoldRequest {
            order_id: order.id,
            amount: 900.0,
            payment_method: None,
        })
        .await
        .unwrap();

    let transaction = h
        .node
        .dispute_transaction(outcome.transaction.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Disputed);
    assert_eq!(
        h.node.get_order(order.id).await.unwrap().status,
        OrderStatus::Disputed
    );

    // Terminal for this core; resolution is an external process
    let refund = h.node.refund_transaction(transaction.id).await;
    assert!(matches!(refund, Err(MarketError::InvalidState(_))));
    let confirm = h.node.confirm_transaction(transaction.id).await;
    assert!(matches!(confirm, Err(MarketError::InvalidState(_))));
}

#[tokio::test]
async fn capture_failure_keeps_escrow_intact() {
    let h = harness();
    let buyer = verified_buyer(&h.node).await;
    let (_, item) = seller_with_item(&h.node, 1200.0).await;

    let order = h
        .node
        .create_order(CreateOrderRequest {
            buyer_id: buyer,
            item_id: Some(item),
            service_id: None,
        })
        .await
        .unwrap();
    let outcome = h
        .node
        .initiate_hold(InitiateHoldRequest {
            order_id: order.id,
            amount: 1200.0,
            payment_method: None,
        })
        .await
        .unwrap();

    h.gateway.fail_capture(true);
    let result = h.node.confirm_transaction(outcome.transaction.id).await;
    assert!(matches!(result, Err(MarketError::Gateway { .. })));

    // Held escrow survives the failed capture and succeeds on retry
    h.gateway.fail_capture(false);
    let transaction = h
        .node
        .confirm_transaction(outcome.transaction.id)
        .await
        .unwrap();
    assert_eq!(transaction.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn manual_order_transitions_respect_the_table() {
    let h = harness();
    let buyer = verified_buyer(&h.node).await;
    let (_, item) = seller_with_item(&h.node, 100.0).await;

    let order = h
        .node
        .create_order(CreateOrderRequest {
            buyer_id: buyer,
            item_id: Some(item),
            service_id: None,
        })
        .await
        .unwrap();

    // Pending orders can be cancelled outright
    let order = h
        .node
        .transition_order(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // Cancelled is terminal except for disputes
    let confirm = h
        .node
        .transition_order(order.id, OrderStatus::Confirmed)
        .await;
    assert!(matches!(confirm, Err(MarketError::InvalidTransition { .. })));

    // No hold can be placed on a cancelled order
    let hold = h
        .node
        .initiate_hold(InitiateHoldRequest {
            order_id: order.id,
            amount: 100.0,
            payment_method: None,
        })
        .await;
    assert!(matches!(hold, Err(MarketError::InvalidState(_))));
}

#[tokio::test]
async fn search_spans_items_and_services() {
    let h = harness();
    let (seller, _) = seller_with_item(&h.node, 100.0).await;
    h.node
        .add_service(AddServiceRequest {
            title: "Samovar polishing".to_string(),
            description: None,
            price: 50.0,
            provider_id: seller,
        })
        .await
        .unwrap();

    let results = h.node.search_listings("samovar").await.unwrap();
    assert_eq!(results.len(), 2);
}
