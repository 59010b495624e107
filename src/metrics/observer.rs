use crate::domain::order::{OrderStatus, TransitionAction};

// ============================================================================
// Lifecycle Observer - injectable observability hooks
// ============================================================================
//
// The order service and the notification hub report what happened through
// this trait instead of calling a global logger. Every hook defaults to a
// no-op; `Metrics` implements them as Prometheus counters.
//
// ============================================================================

/// Why a channel left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCloseReason {
    Completed,
    TimedOut,
    Errored,
    WriteFailed,
    Dropped,
}

impl ChannelCloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelCloseReason::Completed => "completed",
            ChannelCloseReason::TimedOut => "timeout",
            ChannelCloseReason::Errored => "error",
            ChannelCloseReason::WriteFailed => "write_failed",
            ChannelCloseReason::Dropped => "dropped",
        }
    }
}

pub trait LifecycleObserver: Send + Sync {
    fn transition_committed(
        &self,
        _from: OrderStatus,
        _to: OrderStatus,
        _action: TransitionAction,
    ) {
    }

    fn transition_rejected(&self, _from: OrderStatus, _action: TransitionAction) {}

    fn channel_opened(&self) {}

    fn channel_closed(&self, _reason: ChannelCloseReason) {}

    fn push_delivered(&self) {}

    fn push_failed(&self) {}

    fn owner_unresolved(&self) {}
}

/// Observer that ignores every hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LifecycleObserver for NoopObserver {}
