use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::aggregate::{NewOrder, Order};
use super::errors::OrderError;
use super::value_objects::{OrderStatus, TransitionAction};
use crate::audit::AuditEvent;
use crate::metrics::LifecycleObserver;
use crate::notifications::StatusNotifier;
use crate::store::OrderStore;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load → status machine → atomic commit (order + audit event)
//               → observer → best-effort notification
//
// Nothing is written when the status machine refuses the action, and a
// notification problem never turns a committed transition into an error.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn StatusNotifier>,
    observer: Arc<dyn LifecycleObserver>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn StatusNotifier>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self {
            store,
            notifier,
            observer,
        }
    }

    /// Persist a new `PENDING` order and its creation event.
    pub async fn register_order(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        let mut order = Order::new(
            Uuid::now_v7(),
            new_order.owner_id,
            new_order.items,
            new_order.amounts,
        );
        let creation = order.record_creation();

        self.store.insert_order(&order, &creation).await?;

        tracing::info!(
            order_id = %order.id,
            owner_id = %order.owner_id,
            item_count = order.items.len(),
            "Registered order"
        );
        Ok(order)
    }

    pub async fn load_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .load_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    pub async fn current_status(&self, order_id: Uuid) -> Result<OrderStatus, OrderError> {
        Ok(self.load_order(order_id).await?.status())
    }

    /// Apply `action` to the order and return the committed audit event.
    /// The order's new status is `event.new_status`.
    pub async fn apply_transition(
        &self,
        order_id: Uuid,
        action: TransitionAction,
        reason: Option<String>,
    ) -> Result<AuditEvent, OrderError> {
        let mut order = self.load_order(order_id).await?;
        let expected_version = order.version;
        let previous = order.status();

        let event = match order.apply_transition(action, reason, Utc::now()) {
            Ok(event) => event,
            Err(e) => {
                self.observer.transition_rejected(previous, action);
                tracing::info!(
                    order_id = %order_id,
                    status = %previous,
                    action = %action,
                    direction = %e.direction,
                    "Transition refused"
                );
                return Err(e.into());
            }
        };

        self.store
            .commit_transition(&order, expected_version, &event)
            .await?;

        self.observer
            .transition_committed(previous, event.new_status, action);
        tracing::info!(
            order_id = %order_id,
            from = %previous,
            to = %event.new_status,
            action = %action,
            version = order.version,
            "✅ Committed order transition"
        );

        self.notifier.notify_status_change(&order).await;

        Ok(event)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
