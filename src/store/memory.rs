use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuditRepository, OrderStore, StoreError, UserDirectory};
use crate::audit::{sort_history, AuditEvent};
use crate::domain::order::Order;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Order rows and audit rows live under one lock, so a commit is visible to
// readers either entirely or not at all.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    audit: HashMap<Uuid, Vec<AuditEvent>>,
}

impl Tables {
    fn check_extends_chain(&self, event: &AuditEvent) -> Result<(), StoreError> {
        let previous = self.audit.get(&event.order_id).and_then(|events| events.last());
        if event.follows(previous) {
            Ok(())
        } else {
            Err(StoreError::BrokenAuditChain {
                order_id: event.order_id,
                sequence_number: event.sequence_number,
            })
        }
    }

    fn push_event(&mut self, event: &AuditEvent) {
        self.audit.entry(event.order_id).or_default().push(event.clone());
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an order row without any audit event, as an upstream order
    /// service would before handing the order to this core.
    pub async fn seed_order(&self, order: Order) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        tables.orders.insert(order.id, order);
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for InMemoryOrderStore {
    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        let tables = self.tables.read().await;
        let mut events = tables.audit.get(&order_id).cloned().unwrap_or_default();
        sort_history(&mut events);
        Ok(events)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn insert_order(&self, order: &Order, creation: &AuditEvent) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        tables.check_extends_chain(creation)?;

        tables.orders.insert(order.id, order.clone());
        tables.push_event(creation);
        Ok(())
    }

    async fn commit_transition(
        &self,
        order: &Order,
        expected_version: i64,
        event: &AuditEvent,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let current_version = tables
            .orders
            .get(&order.id)
            .map(|stored| stored.version)
            .ok_or(StoreError::MissingOrder(order.id))?;
        if current_version != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                order_id: order.id,
                expected: expected_version,
                actual: current_version,
            });
        }
        tables.check_extends_chain(event)?;

        tables.orders.insert(order.id, order.clone());
        tables.push_event(event);

        tracing::debug!(
            order_id = %event.order_id,
            sequence_number = event.sequence_number,
            new_status = %event.new_status,
            "Committed transition"
        );
        Ok(())
    }
}

/// Directory backed by a fixed map of user id to contact identity.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    contacts: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: Uuid, identity: impl Into<String>) {
        self.contacts.write().await.insert(user_id, identity.into());
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn contact_identity(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        Ok(self.contacts.read().await.get(&user_id).cloned())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
