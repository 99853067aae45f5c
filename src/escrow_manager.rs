//! Transaction/Escrow Manager
//!
//! Creates a held payment against an order, tracks the platform fee, and
//! transitions transactions to completed/refunded/disputed while keeping
//! the linked order's status synchronized. Every persisted mutation is
//! applied in a single write scope; the gateway call always happens before
//! the local status write that claims its result.

use crate::config::EscrowConfig;
use crate::error::MarketError;
use crate::gateway::{HoldRequest, PaymentGateway, PaymentState};
use crate::models::{EscrowEvent, OrderStatus, Transaction, TransactionStatus};
use crate::order_manager::OrderManager;
use crate::MarketResult;
use chrono::Utc;
use std::future::Future;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Hold initiation request
#[derive(Debug, Clone)]
pub struct InitiateHoldRequest {
    pub order_id: Uuid,
    pub amount: f64,
    pub payment_method: Option<String>,
}

/// Result of a successful hold initiation
#[derive(Debug, Clone)]
pub struct HoldOutcome {
    pub transaction: Transaction,
    /// URL the buyer must visit to confirm the hold
    pub confirmation_url: Option<String>,
}

/// Manages escrow transactions and their order cascades
pub struct EscrowManager {
    config: EscrowConfig,
    /// In-memory transaction storage keyed by order_id; the key is the
    /// in-process analogue of a unique constraint on order_id
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    /// Append-only audit trail
    events: Arc<RwLock<Vec<EscrowEvent>>>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<OrderManager>,
}

impl EscrowManager {
    pub fn new(
        config: EscrowConfig,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<OrderManager>,
    ) -> Self {
        Self {
            config,
            transactions: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(Vec::new())),
            gateway,
            orders,
        }
    }

    /// Initiate a hold for an order.
    ///
    /// The order's transaction slot is reserved with a `Pending` row before
    /// the gateway is called, so concurrent holds on one order serialize on
    /// the reservation and at most one transaction ever exists per order.
    /// On gateway failure or timeout the reservation is removed and no
    /// transaction survives. This layer never retries; the `Conflict` guard
    /// makes client-side retry safe.
    pub async fn initiate_hold(&self, request: InitiateHoldRequest) -> MarketResult<HoldOutcome> {
        if request.amount <= 0.0 {
            return Err(MarketError::validation("Amount must be greater than 0"));
        }
        if request.amount > self.config.max_amount {
            return Err(MarketError::validation(format!(
                "Amount {} exceeds maximum {}",
                request.amount, self.config.max_amount
            )));
        }

        let order = self.orders.get_order(request.order_id).await?;
        if order.status.is_terminal() {
            return Err(MarketError::invalid_state(format!(
                "Order {} is {:?}; no payment can be held",
                order.id, order.status
            )));
        }

        // Reserve the order's transaction slot under one lock acquisition
        let transaction = {
            let mut transactions = self.transactions.write().await;
            if transactions.contains_key(&request.order_id) {
                return Err(MarketError::conflict(format!(
                    "Order {} already has a transaction",
                    request.order_id
                )));
            }
            let transaction = Transaction::new(
                request.order_id,
                request.amount,
                self.config.platform_fee,
                request.payment_method,
            );
            transactions.insert(request.order_id, transaction.clone());
            transaction
        };

        info!(
            "Initiating hold for order {} (transaction: {}, amount: {})",
            request.order_id, transaction.id, request.amount
        );

        // Fresh key per attempt; the gateway dedups retries on its side
        let hold = HoldRequest {
            amount: request.amount,
            currency: self.config.currency.clone(),
            idempotency_key: Uuid::new_v4().to_string(),
            description: format!("Order {}", request.order_id),
            metadata: Some(serde_json::json!({
                "order_id": request.order_id,
                "transaction_id": transaction.id,
            })),
        };

        let receipt = match self
            .with_timeout("create_hold", self.gateway.create_hold(hold))
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                // Roll back the reservation; no transaction is persisted
                self.transactions.write().await.remove(&request.order_id);
                warn!(
                    "Hold failed for order {}: {} (reservation removed)",
                    request.order_id, err
                );
                return Err(err);
            }
        };

        // Claim the gateway result: transaction -> Held, order -> Confirmed.
        // The order is re-checked under both locks: it may have reached a
        // terminal state while the gateway call was in flight.
        let claim = {
            let mut transactions = self.transactions.write().await;
            let orders_store = self.orders.store();
            let mut orders = orders_store.write().await;

            let order_status = orders
                .get(&request.order_id)
                .map(|order| order.status)
                .ok_or_else(|| {
                    MarketError::internal(format!("Order {} disappeared", request.order_id))
                })?;

            if order_status.is_terminal() {
                transactions.remove(&request.order_id);
                Err(order_status)
            } else {
                let transaction = transactions.get_mut(&request.order_id).ok_or_else(|| {
                    MarketError::internal(format!(
                        "Reservation for order {} disappeared",
                        request.order_id
                    ))
                })?;
                transaction.validate_transition(TransactionStatus::Held)?;

                transaction.status = TransactionStatus::Held;
                transaction.payment_id = Some(receipt.payment_id.clone());
                transaction.updated_at = Utc::now();

                if let Some(order) = orders.get_mut(&request.order_id) {
                    if order.status == OrderStatus::Pending {
                        order.status = OrderStatus::Confirmed;
                        order.updated_at = Utc::now();
                    }
                }

                Ok(transaction.clone())
            }
        };

        let transaction = match claim {
            Ok(transaction) => transaction,
            Err(status) => {
                // Compensating action: the gateway hold exists but no local
                // row may claim it, so release the funds back to the buyer
                if let Err(err) = self
                    .with_timeout(
                        "refund",
                        self.gateway.refund(&receipt.payment_id, request.amount),
                    )
                    .await
                {
                    warn!(
                        "Failed to release orphaned hold {} for order {}: {}",
                        receipt.payment_id, request.order_id, err
                    );
                }
                return Err(MarketError::invalid_state(format!(
                    "Order {} became {:?} while the hold was created; hold released",
                    request.order_id, status
                )));
            }
        };

        self.record_event(
            "hold.created",
            &transaction,
            Some(serde_json::json!({ "confirmation_url": receipt.confirmation_url })),
        )
        .await;

        info!(
            "Held payment {} for order {}",
            receipt.payment_id, request.order_id
        );

        Ok(HoldOutcome {
            transaction,
            confirmation_url: receipt.confirmation_url,
        })
    }

    /// Capture a held transaction.
    ///
    /// Fails with `InvalidState` unless the transaction is `Held`; the
    /// guard fires before any gateway call. On capture success the
    /// transaction becomes `Completed` and the order `Delivered` in the
    /// same write scope. On capture failure the transaction stays `Held`.
    pub async fn confirm_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        let transaction = self.get_transaction(transaction_id).await?;
        if !transaction.status.can_confirm() {
            return Err(MarketError::invalid_state(format!(
                "Transaction {} is {:?}, expected Held",
                transaction_id, transaction.status
            )));
        }

        let payment_id = transaction.payment_id.clone().ok_or_else(|| {
            MarketError::internal(format!(
                "Held transaction {} has no payment reference",
                transaction_id
            ))
        })?;

        let state = self
            .with_timeout(
                "capture",
                self.gateway.capture(&payment_id, transaction.amount),
            )
            .await?;
        if state != PaymentState::Succeeded {
            return Err(MarketError::gateway(
                "unexpected_state".to_string(),
                format!("Capture of {} left payment in {:?}", payment_id, state),
            ));
        }

        let transaction = self
            .apply_outcome(
                transaction_id,
                TransactionStatus::Completed,
                OrderStatus::Delivered,
            )
            .await?;

        self.record_event("transaction.completed", &transaction, None)
            .await;

        info!("Captured payment {} ({})", payment_id, transaction_id);

        Ok(transaction)
    }

    /// Move a held or completed transaction into dispute.
    ///
    /// No gateway call is made; resolution belongs to an external process.
    pub async fn dispute_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        let transaction = self.get_transaction(transaction_id).await?;
        if !transaction.status.can_dispute() {
            return Err(MarketError::invalid_state(format!(
                "Transaction {} is {:?}, expected Held or Completed",
                transaction_id, transaction.status
            )));
        }

        let transaction = self
            .apply_outcome(
                transaction_id,
                TransactionStatus::Disputed,
                OrderStatus::Disputed,
            )
            .await?;

        self.record_event("transaction.disputed", &transaction, None)
            .await;

        warn!("Transaction {} disputed", transaction_id);

        Ok(transaction)
    }

    /// Refund a held transaction, releasing the funds to the buyer.
    ///
    /// Cascades the order to `Cancelled` in the same write scope.
    pub async fn refund_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        let transaction = self.get_transaction(transaction_id).await?;
        if !transaction.status.can_refund() {
            return Err(MarketError::invalid_state(format!(
                "Transaction {} is {:?}, expected Held",
                transaction_id, transaction.status
            )));
        }

        let payment_id = transaction.payment_id.clone().ok_or_else(|| {
            MarketError::internal(format!(
                "Held transaction {} has no payment reference",
                transaction_id
            ))
        })?;

        self.with_timeout(
            "refund",
            self.gateway.refund(&payment_id, transaction.amount),
        )
        .await?;

        let transaction = self
            .apply_outcome(
                transaction_id,
                TransactionStatus::Refunded,
                OrderStatus::Cancelled,
            )
            .await?;

        self.record_event("transaction.refunded", &transaction, None)
            .await;

        info!("Refunded payment {} ({})", payment_id, transaction_id);

        Ok(transaction)
    }

    /// Reconcile a transaction against the gateway's view of its payment.
    ///
    /// Recovery path for a crash between gateway success and local commit:
    /// re-queries the payment by its id and applies the cascade the normal
    /// path would have applied. Only moves state forward; never invents a
    /// hold.
    pub async fn reconcile_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        let transaction = self.get_transaction(transaction_id).await?;
        if transaction.status != TransactionStatus::Held {
            return Ok(transaction);
        }

        let payment_id = match transaction.payment_id.clone() {
            Some(id) => id,
            None => return Ok(transaction),
        };

        let state = self
            .with_timeout("get_payment", self.gateway.get_payment(&payment_id))
            .await?;

        let reconciled = match state {
            PaymentState::Succeeded => {
                self.apply_outcome(
                    transaction_id,
                    TransactionStatus::Completed,
                    OrderStatus::Delivered,
                )
                .await?
            }
            PaymentState::Canceled => {
                self.apply_outcome(
                    transaction_id,
                    TransactionStatus::Refunded,
                    OrderStatus::Cancelled,
                )
                .await?
            }
            PaymentState::WaitingForCapture | PaymentState::Pending => return Ok(transaction),
        };

        self.record_event(
            "transaction.reconciled",
            &reconciled,
            Some(serde_json::json!({ "gateway_state": state })),
        )
        .await;

        info!(
            "Reconciled transaction {} to {:?}",
            transaction_id, reconciled.status
        );

        Ok(reconciled)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, transaction_id: Uuid) -> MarketResult<Transaction> {
        self.transactions
            .read()
            .await
            .values()
            .find(|t| t.id == transaction_id)
            .cloned()
            .ok_or_else(|| {
                MarketError::not_found(format!("Transaction {} not found", transaction_id))
            })
    }

    /// Get the transaction attached to an order, if any
    pub async fn transaction_for_order(&self, order_id: Uuid) -> MarketResult<Transaction> {
        self.transactions
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or_else(|| {
                MarketError::not_found(format!("Order {} has no transaction", order_id))
            })
    }

    /// Get audit events for an order
    pub async fn events_for_order(&self, order_id: Uuid) -> MarketResult<Vec<EscrowEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    /// Apply a transaction outcome and its order cascade in one write
    /// scope. Both transitions are validated before either entity is
    /// touched, so no observer ever sees half a cascade. Lock order is
    /// transactions, then orders.
    async fn apply_outcome(
        &self,
        transaction_id: Uuid,
        transaction_target: TransactionStatus,
        order_target: OrderStatus,
    ) -> MarketResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .values_mut()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| {
                MarketError::not_found(format!("Transaction {} not found", transaction_id))
            })?;

        let orders_store = self.orders.store();
        let mut orders = orders_store.write().await;
        let order = orders.get_mut(&transaction.order_id).ok_or_else(|| {
            MarketError::internal(format!(
                "Transaction {} references missing order {}",
                transaction_id, transaction.order_id
            ))
        })?;

        transaction.validate_transition(transaction_target)?;
        if order.status != order_target {
            order.validate_transition(order_target)?;
        }

        let now = Utc::now();
        transaction.status = transaction_target;
        transaction.updated_at = now;
        order.status = order_target;
        order.updated_at = now;

        Ok(transaction.clone())
    }

    async fn record_event(
        &self,
        event_type: &str,
        transaction: &Transaction,
        metadata: Option<serde_json::Value>,
    ) {
        let event = EscrowEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            order_id: Some(transaction.order_id),
            transaction_id: Some(transaction.id),
            payment_id: transaction.payment_id.clone(),
            amount: Some(transaction.amount),
            metadata,
            created_at: Utc::now(),
        };

        self.events.write().await.push(event);
    }

    /// Run a gateway call under the configured deadline. A timeout is a
    /// failure, never an implicit success.
    async fn with_timeout<T, F>(&self, what: &str, call: F) -> MarketResult<T>
    where
        F: Future<Output = MarketResult<T>>,
    {
        match tokio::time::timeout(
            Duration::from_secs(self.config.gateway_timeout_secs),
            call,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(MarketError::timeout(format!(
                "Gateway {} call exceeded {}s",
                what, self.config.gateway_timeout_secs
            ))),
        }
    }
}
