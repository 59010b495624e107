use uuid::Uuid;

use super::value_objects::{OrderStatus, TransitionAction, TransitionDirection};
use crate::store::StoreError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// The requested action has no target from the current status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Illegal {direction} transition for order {}: cannot {action} from {from}",
    order_label(.order_id)
)]
pub struct IllegalTransition {
    pub order_id: Option<Uuid>,
    pub from: OrderStatus,
    pub action: TransitionAction,
    pub direction: TransitionDirection,
}

fn order_label(order_id: &Option<Uuid>) -> String {
    order_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<unassigned>".to_string())
}

impl IllegalTransition {
    pub fn new(from: OrderStatus, action: TransitionAction) -> Self {
        Self {
            order_id: None,
            from,
            action,
            direction: action.direction(),
        }
    }

    pub fn with_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn is_backward(&self) -> bool {
        self.direction == TransitionDirection::Backward
    }
}

/// Failures surfaced by the order service to its callers.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order store failure: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_message_names_order_and_direction() {
        let order_id = Uuid::new_v4();
        let err = IllegalTransition::new(OrderStatus::Preparing, TransitionAction::Cancel)
            .with_order(order_id);

        let message = err.to_string();
        assert!(message.contains(&order_id.to_string()));
        assert!(message.contains("backward"));
        assert!(message.contains("PREPARING"));
        assert!(err.is_backward());
    }

    #[test]
    fn test_illegal_transition_without_order() {
        let err = IllegalTransition::new(OrderStatus::Completed, TransitionAction::Forward);
        assert!(err.to_string().contains("<unassigned>"));
        assert!(!err.is_backward());
    }
}
