// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (OrderStatus, TransitionAction, OrderItem, MoneySummary)
// - Status machine (pure transition function)
// - Errors (IllegalTransition, OrderError)
// - Aggregate (Order, applies transitions and emits audit events)
// - Command Handler (OrderService, load → transition → commit → notify)
//
// ============================================================================

pub mod value_objects;
pub mod state_machine;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use state_machine::{action_for_move, allowed_actions, is_backward_move, transition};
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
