use super::errors::IllegalTransition;
use super::value_objects::{OrderStatus, TransitionAction};

// ============================================================================
// Order Status Machine
// ============================================================================
//
// Pure mapping (status, action) -> next status. Every non-terminal status
// declares its own forward / backward / cancel / reject targets; terminal
// statuses declare none.
//
//   PENDING -> CONFIRMED -> PREPARING -> READY -> COMPLETED
//      |           |  \          |          |
//      +- cancel --+   +------- reject -----+
//
// ============================================================================

/// Outgoing targets of a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StageRules {
    forward: Option<OrderStatus>,
    backward: Option<OrderStatus>,
    cancel: Option<OrderStatus>,
    reject: Option<OrderStatus>,
}

impl StageRules {
    const TERMINAL: StageRules = StageRules {
        forward: None,
        backward: None,
        cancel: None,
        reject: None,
    };

    fn target(&self, action: TransitionAction) -> Option<OrderStatus> {
        match action {
            TransitionAction::Forward => self.forward,
            TransitionAction::Backward => self.backward,
            TransitionAction::Cancel => self.cancel,
            TransitionAction::Reject => self.reject,
        }
    }
}

fn rules_for(status: OrderStatus) -> StageRules {
    use crate::domain::order::OrderStatus::*;

    match status {
        Pending => StageRules {
            forward: Some(Confirmed),
            backward: None,
            cancel: Some(Cancelled),
            reject: None,
        },
        Confirmed => StageRules {
            forward: Some(Preparing),
            backward: Some(Pending),
            cancel: Some(Cancelled),
            reject: Some(Rejected),
        },
        Preparing => StageRules {
            forward: Some(Ready),
            backward: Some(Confirmed),
            cancel: None,
            reject: Some(Rejected),
        },
        Ready => StageRules {
            forward: Some(Completed),
            backward: Some(Preparing),
            cancel: None,
            reject: Some(Rejected),
        },
        Completed | Cancelled | Rejected => StageRules::TERMINAL,
    }
}

/// Resolve the status reached by applying `action` to `current`.
pub fn transition(
    current: OrderStatus,
    action: TransitionAction,
) -> Result<OrderStatus, IllegalTransition> {
    rules_for(current)
        .target(action)
        .ok_or_else(|| IllegalTransition::new(current, action))
}

/// Actions that succeed from `status`, in declaration order.
pub fn allowed_actions(status: OrderStatus) -> Vec<TransitionAction> {
    let rules = rules_for(status);
    TransitionAction::ALL
        .into_iter()
        .filter(|action| rules.target(*action).is_some())
        .collect()
}

/// The action that moves an order from `from` straight to `to`.
///
/// A move no single action produces fails with the action the caller most
/// plausibly meant, so the error keeps its direction framing.
pub fn action_for_move(
    from: OrderStatus,
    to: OrderStatus,
) -> Result<TransitionAction, IllegalTransition> {
    let rules = rules_for(from);
    if let Some(action) = TransitionAction::ALL
        .into_iter()
        .find(|action| rules.target(*action) == Some(to))
    {
        return Ok(action);
    }

    let intended = match to {
        OrderStatus::Cancelled => TransitionAction::Cancel,
        OrderStatus::Rejected => TransitionAction::Reject,
        _ if is_backward_move(from, to) => TransitionAction::Backward,
        _ => TransitionAction::Forward,
    };
    Err(IllegalTransition::new(from, intended))
}

/// True when `to` lies earlier on the fulfillment chain than `from`.
pub fn is_backward_move(from: OrderStatus, to: OrderStatus) -> bool {
    match (from.chain_position(), to.chain_position()) {
        (Some(from), Some(to)) => to < from,
        _ => false,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
