// Private module declarations
mod observer;
mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::domain::order::{OrderStatus, TransitionAction};

// Re-export for public API
pub use observer::{ChannelCloseReason, LifecycleObserver, NoopObserver};
pub use server::{routes, start_status_server, StatusState};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order transitions (committed, rejected by the status machine)
// - Push deliveries and failed channel writes
// - Open notification channels and why they closed
// - Owners that could not be resolved for notification
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the service
pub struct Metrics {
    registry: Registry,

    // Transition Metrics
    pub transitions_committed: IntCounterVec,
    pub transitions_rejected: IntCounterVec,

    // Notification Metrics
    pub pushes_delivered: IntCounter,
    pub pushes_failed: IntCounter,
    pub owners_unresolved: IntCounter,

    // Channel Metrics
    pub channels_open: IntGauge,
    pub channels_closed: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Transition Metrics
        let transitions_committed = IntCounterVec::new(
            Opts::new(
                "order_transitions_committed_total",
                "Order transitions committed with an audit event",
            ),
            &["from_status", "to_status", "action"],
        )?;
        registry.register(Box::new(transitions_committed.clone()))?;

        let transitions_rejected = IntCounterVec::new(
            Opts::new(
                "order_transitions_rejected_total",
                "Transition requests refused by the status machine",
            ),
            &["from_status", "action"],
        )?;
        registry.register(Box::new(transitions_rejected.clone()))?;

        // Notification Metrics
        let pushes_delivered = IntCounter::new(
            "notification_pushes_delivered_total",
            "Status messages written to a subscriber channel",
        )?;
        registry.register(Box::new(pushes_delivered.clone()))?;

        let pushes_failed = IntCounter::new(
            "notification_pushes_failed_total",
            "Channel writes that failed and unregistered the channel",
        )?;
        registry.register(Box::new(pushes_failed.clone()))?;

        let owners_unresolved = IntCounter::new(
            "notification_owners_unresolved_total",
            "Status changes skipped because the owner had no contact identity",
        )?;
        registry.register(Box::new(owners_unresolved.clone()))?;

        // Channel Metrics
        let channels_open = IntGauge::new(
            "notification_channels_open",
            "Subscriber channels currently registered",
        )?;
        registry.register(Box::new(channels_open.clone()))?;

        let channels_closed = IntCounterVec::new(
            Opts::new(
                "notification_channels_closed_total",
                "Subscriber channels removed from the registry",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(channels_closed.clone()))?;

        Ok(Self {
            registry,
            transitions_committed,
            transitions_rejected,
            pushes_delivered,
            pushes_failed,
            owners_unresolved,
            channels_open,
            channels_closed,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl LifecycleObserver for Metrics {
    fn transition_committed(&self, from: OrderStatus, to: OrderStatus, action: TransitionAction) {
        self.transitions_committed
            .with_label_values(&[from.code(), to.code(), action.name()])
            .inc();
    }

    fn transition_rejected(&self, from: OrderStatus, action: TransitionAction) {
        self.transitions_rejected
            .with_label_values(&[from.code(), action.name()])
            .inc();
    }

    fn channel_opened(&self) {
        self.channels_open.inc();
    }

    fn channel_closed(&self, reason: ChannelCloseReason) {
        self.channels_open.dec();
        self.channels_closed.with_label_values(&[reason.as_str()]).inc();
    }

    fn push_delivered(&self) {
        self.pushes_delivered.inc();
    }

    fn push_failed(&self) {
        self.pushes_failed.inc();
    }

    fn owner_unresolved(&self) {
        self.owners_unresolved.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> f64 {
        let gathered = metrics.registry().gather();
        let family = gathered.iter().find(|m| m.name() == name).unwrap();
        family.metric.iter().map(|m| m.counter.value.unwrap_or(0.0)).sum()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_transition_hooks() {
        let metrics = Metrics::new().unwrap();
        let forward = TransitionAction::Forward;
        metrics.transition_committed(OrderStatus::Pending, OrderStatus::Confirmed, forward);
        metrics.transition_committed(OrderStatus::Confirmed, OrderStatus::Preparing, forward);
        metrics.transition_rejected(OrderStatus::Preparing, TransitionAction::Cancel);

        assert_eq!(counter_value(&metrics, "order_transitions_committed_total"), 2.0);
        assert_eq!(counter_value(&metrics, "order_transitions_rejected_total"), 1.0);
    }

    #[test]
    fn test_channel_gauge_tracks_open_channels() {
        let metrics = Metrics::new().unwrap();
        metrics.channel_opened();
        metrics.channel_opened();
        metrics.channel_closed(ChannelCloseReason::WriteFailed);

        assert_eq!(metrics.channels_open.get(), 1);
        assert_eq!(counter_value(&metrics, "notification_channels_closed_total"), 1.0);
    }
}
