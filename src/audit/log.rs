use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::event::{AuditEvent, StatusDuration};
use super::queries;
use crate::domain::order::{action_for_move, Order, OrderError, OrderStatus};
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Audit Log - history and analytics keyed by order id
// ============================================================================
//
// Writes go through the order store's atomic commit, so an event is never
// stored without the order status it describes.
//
// ============================================================================

pub struct AuditLog {
    store: Arc<dyn OrderStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Record `previous -> new` for `order` and move the stored order to
    /// `new` in the same commit.
    ///
    /// `order` is the caller's view; a stale version is a conflict. The move
    /// must be one the status machine allows from the stored status.
    /// `previous = None` records the creation event of an order that has no
    /// history yet. No notification is sent.
    pub async fn record(
        &self,
        order: &Order,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        reason: Option<String>,
    ) -> Result<AuditEvent, OrderError> {
        let mut stored = self
            .store
            .load_order(order.id)
            .await?
            .ok_or(OrderError::OrderNotFound(order.id))?;
        let expected_version = stored.version;

        if expected_version != order.version {
            return Err(StoreError::ConcurrencyConflict {
                order_id: order.id,
                expected: order.version,
                actual: expected_version,
            }
            .into());
        }

        let event = match previous_status {
            None if expected_version == 0 && new_status == stored.status() => {
                stored.record_creation()
            }
            Some(previous) if previous == stored.status() => {
                let action = action_for_move(previous, new_status)
                    .map_err(|e| e.with_order(order.id))?;
                stored.apply_transition(action, reason, Utc::now())?
            }
            _ => {
                tracing::warn!(
                    order_id = %order.id,
                    stored_status = %stored.status(),
                    previous = ?previous_status,
                    new = %new_status,
                    "Audit record does not follow stored order"
                );
                return Err(StoreError::BrokenAuditChain {
                    order_id: order.id,
                    sequence_number: expected_version + 1,
                }
                .into());
            }
        };

        self.store
            .commit_transition(&stored, expected_version, &event)
            .await?;
        Ok(event)
    }

    pub async fn history(&self, order_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        self.store.events_for_order(order_id).await
    }

    pub async fn latest(&self, order_id: Uuid) -> Result<Option<AuditEvent>, StoreError> {
        Ok(self.history(order_id).await?.pop())
    }

    pub async fn backward_transitions(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let history = self.history(order_id).await?;
        let backward = queries::backward_transitions(&history);

        if !backward.is_empty() {
            tracing::warn!(
                order_id = %order_id,
                count = backward.len(),
                "Order moved backwards through fulfillment"
            );
        }
        Ok(backward)
    }

    pub async fn first_time_reached(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let history = self.history(order_id).await?;
        Ok(queries::first_time_reached(&history, status))
    }

    pub async fn duration_in_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<StatusDuration, StoreError> {
        let history = self.history(order_id).await?;
        Ok(queries::duration_in_status(&history, status))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::MoneySummary;
    use crate::store::InMemoryOrderStore;

    fn create_test_order() -> Order {
        Order::new(Uuid::new_v4(), Uuid::new_v4(), vec![], MoneySummary::default())
    }

    async fn seeded_log() -> (Arc<InMemoryOrderStore>, AuditLog, Order) {
        let store = Arc::new(InMemoryOrderStore::new());
        let order = create_test_order();
        store.seed_order(order.clone()).await.unwrap();
        let log = AuditLog::new(store.clone());
        (store, log, order)
    }

    async fn stored(store: &InMemoryOrderStore, order_id: Uuid) -> Order {
        store.load_order(order_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_record_moves_order_with_event() {
        let (store, log, order) = seeded_log().await;

        let created = log
            .record(&order, None, OrderStatus::Pending, None)
            .await
            .unwrap();
        let order = stored(&store, order.id).await;
        assert_eq!(order.version, 1);

        let confirmed = log
            .record(
                &order,
                Some(OrderStatus::Pending),
                OrderStatus::Confirmed,
                Some("accepted".to_string()),
            )
            .await
            .unwrap();

        let order = stored(&store, order.id).await;
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.version, confirmed.sequence_number);

        let history = log.history(order.id).await.unwrap();
        assert_eq!(history, vec![created, confirmed.clone()]);
        assert!(queries::is_consistent_chain(&history));
        assert_eq!(log.latest(order.id).await.unwrap(), Some(confirmed));
    }

    #[tokio::test]
    async fn test_record_refuses_move_the_status_machine_forbids() {
        let (store, log, order) = seeded_log().await;

        let result = log
            .record(&order, Some(OrderStatus::Pending), OrderStatus::Completed, None)
            .await;
        match result {
            Err(OrderError::IllegalTransition(e)) => assert_eq!(e.order_id, Some(order.id)),
            other => panic!("expected illegal transition, got {:?}", other),
        }

        assert_eq!(stored(&store, order.id).await, order);
        assert!(log.history(order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_refuses_previous_status_not_stored() {
        let (store, log, order) = seeded_log().await;

        let result = log
            .record(&order, Some(OrderStatus::Ready), OrderStatus::Completed, None)
            .await;
        assert!(matches!(
            result,
            Err(OrderError::Store(StoreError::BrokenAuditChain { .. }))
        ));

        // A second creation event once history exists is refused too.
        log.record(&order, None, OrderStatus::Pending, None).await.unwrap();
        let order = stored(&store, order.id).await;
        let again = log.record(&order, None, OrderStatus::Pending, None).await;
        assert!(matches!(
            again,
            Err(OrderError::Store(StoreError::BrokenAuditChain { .. }))
        ));

        assert_eq!(stored(&store, order.id).await.status(), OrderStatus::Pending);
        assert_eq!(log.history(order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_with_stale_order_is_conflict() {
        let (store, log, order) = seeded_log().await;
        log.record(&order, None, OrderStatus::Pending, None).await.unwrap();

        // `order` still carries version 0.
        let result = log
            .record(&order, Some(OrderStatus::Pending), OrderStatus::Confirmed, None)
            .await;
        assert!(matches!(
            result,
            Err(OrderError::Store(StoreError::ConcurrencyConflict { expected: 0, actual: 1, .. }))
        ));
        assert_eq!(stored(&store, order.id).await.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_record_for_unknown_order() {
        let log = AuditLog::new(Arc::new(InMemoryOrderStore::new()));
        let order = create_test_order();

        let result = log.record(&order, None, OrderStatus::Pending, None).await;
        assert!(matches!(result, Err(OrderError::OrderNotFound(id)) if id == order.id));
        assert!(log.history(order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_of_unknown_order_is_empty() {
        let log = AuditLog::new(Arc::new(InMemoryOrderStore::new()));
        let order_id = Uuid::new_v4();

        assert!(log.history(order_id).await.unwrap().is_empty());
        assert_eq!(log.latest(order_id).await.unwrap(), None);
        assert_eq!(
            log.duration_in_status(order_id, OrderStatus::Pending).await.unwrap(),
            StatusDuration::NeverEntered
        );
    }
}
