use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderStatus;

// ============================================================================
// Audit Event - Immutable record of one committed transition
// ============================================================================
//
// `previous_status` is None only for the creation event. `sequence_number`
// equals the order's version once the event is committed, so events of one
// order are numbered 1, 2, 3, ... without gaps.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub order_id: Uuid,
    pub sequence_number: i64,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        order_id: Uuid,
        sequence_number: i64,
        previous_status: Option<OrderStatus>,
        new_status: OrderStatus,
        reason: Option<String>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            order_id,
            sequence_number,
            previous_status,
            new_status,
            reason,
            changed_at,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.previous_status.is_none()
    }

    /// Whether `self` may directly follow `previous` in an order's history.
    pub fn follows(&self, previous: Option<&AuditEvent>) -> bool {
        match previous {
            None => self.sequence_number == 1,
            Some(prev) => {
                self.order_id == prev.order_id
                    && self.sequence_number == prev.sequence_number + 1
                    && self.previous_status == Some(prev.new_status)
                    && self.changed_at >= prev.changed_at
            }
        }
    }
}

/// Dwell time of an order in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDuration {
    Elapsed(chrono::Duration),
    NeverEntered,
    NeverExited,
}

impl StatusDuration {
    pub fn as_duration(&self) -> Option<chrono::Duration> {
        match self {
            StatusDuration::Elapsed(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, StatusDuration::Elapsed(_))
    }
}
