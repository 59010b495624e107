// ============================================================================
// Audit Trail
// ============================================================================
//
// Append-only record of order status transitions:
// - event:   the immutable AuditEvent and the StatusDuration sentinel
// - queries: pure derivations over one order's ordered history
// - log:     AuditLog, the same queries keyed by order id
//
// ============================================================================

mod event;
mod log;
mod queries;

pub use event::{AuditEvent, StatusDuration};
pub use log::AuditLog;
pub use queries::{
    backward_transitions, duration_in_status, first_time_reached, is_consistent_chain,
    sort_history,
};
