// ============================================================================
// Persistence Seams
// ============================================================================
//
// The core talks to persistence only through these traits:
// - OrderStore:      load / insert orders, commit a transition atomically
// - AuditRepository: ordered reads of an order's audit trail
// - UserDirectory:   resolve an owner id to a contact identity
//
// Implementations:
// - memory: process-local store, used by tests and the demo binary
// - scylla_store: order row and audit rows in one partition, written in one
//   conditional batch
//
// ============================================================================

mod memory;
mod scylla_store;

pub use memory::{InMemoryOrderStore, InMemoryUserDirectory};
pub use scylla_store::ScyllaOrderStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::domain::order::Order;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(
        "Concurrency conflict on order {order_id}: expected version {expected}, current is {actual}"
    )]
    ConcurrencyConflict {
        order_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Audit event {sequence_number} does not follow the history of order {order_id}")]
    BrokenAuditChain { order_id: Uuid, sequence_number: i64 },

    #[error("Order already exists: {0}")]
    DuplicateOrder(Uuid),

    #[error("Order not found in store: {0}")]
    MissingOrder(Uuid),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Read side of the audit trail. Events are only ever written together
/// with their order row, through `OrderStore`.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// All events of an order, ascending by time.
    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<AuditEvent>, StoreError>;
}

/// Order persistence. Every method that writes an audit event does so in the
/// same unit of work as the order row.
#[async_trait]
pub trait OrderStore: AuditRepository {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Persist a new order together with its creation event.
    async fn insert_order(&self, order: &Order, creation: &AuditEvent) -> Result<(), StoreError>;

    /// Persist `order` (already carrying its new status and version) and the
    /// event describing the change, provided the stored version still equals
    /// `expected_version`.
    async fn commit_transition(
        &self,
        order: &Order,
        expected_version: i64,
        event: &AuditEvent,
    ) -> Result<(), StoreError>;
}

/// Owner lookup. `Ok(None)` means the owner has no reachable identity.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn contact_identity(&self, user_id: Uuid) -> anyhow::Result<Option<String>>;
}
