use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::IllegalTransition;
use super::state_machine;
use super::value_objects::{MoneySummary, OrderItem, OrderStatus, TransitionAction};
use crate::audit::AuditEvent;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Status changes only through `apply_transition`, which consults the status
// machine and produces the audit event describing the change. Persisting the
// updated order together with that event is the command handler's job.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Current State
    pub owner_id: Uuid,
    pub items: Vec<OrderItem>,
    pub amounts: MoneySummary,
    status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: Uuid,
    pub items: Vec<OrderItem>,
    pub amounts: MoneySummary,
}

impl Order {
    /// A fresh `PENDING` order with no committed events.
    pub fn new(id: Uuid, owner_id: Uuid, items: Vec<OrderItem>, amounts: MoneySummary) -> Self {
        let now = Utc::now();
        Self {
            id,
            version: 0,
            owner_id,
            items,
            amounts,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an order from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        version: i64,
        owner_id: Uuid,
        items: Vec<OrderItem>,
        amounts: MoneySummary,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            version,
            owner_id,
            items,
            amounts,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Build the creation event and bump the version to 1.
    pub fn record_creation(&mut self) -> AuditEvent {
        self.version = 1;
        AuditEvent::new(
            self.id,
            self.version,
            None,
            self.status,
            None,
            self.created_at,
        )
    }

    /// Apply `action` at time `now`. On failure the order is left untouched.
    pub fn apply_transition(
        &mut self,
        action: TransitionAction,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AuditEvent, IllegalTransition> {
        let previous = self.status;
        let next = state_machine::transition(previous, action)
            .map_err(|e| e.with_order(self.id))?;

        // Keep timestamps monotonic per order even if the clock steps back.
        let changed_at = now.max(self.updated_at);

        self.status = next;
        self.version += 1;
        self.updated_at = changed_at;

        Ok(AuditEvent::new(
            self.id,
            self.version,
            Some(previous),
            next,
            reason,
            changed_at,
        ))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
