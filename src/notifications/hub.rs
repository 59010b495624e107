use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::channel::{BufferedChannel, ChannelError, ChannelId, PushChannel};
use super::payload::PushMessage;
use crate::metrics::{ChannelCloseReason, LifecycleObserver};

// ============================================================================
// Notification Hub - recipient -> open channels, with fan-out
// ============================================================================
//
// The registry is a sharded map, so subscribe/unregister for one recipient
// never waits on another recipient's shard. Fan-out copies the recipient's
// channel list and releases the shard before writing; a channel whose write
// fails is unregistered and delivery continues with the rest.
//
// ============================================================================

/// Outcome of one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct NotificationHub {
    channels: DashMap<String, Vec<Arc<dyn PushChannel>>>,
    channel_buffer: usize,
    observer: Arc<dyn LifecycleObserver>,
}

impl NotificationHub {
    pub fn new(channel_buffer: usize, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            channels: DashMap::new(),
            channel_buffer,
            observer,
        }
    }

    /// Open a buffered channel for `recipient`. The returned handle stays
    /// registered until the transport signals an end or the handle drops.
    pub fn subscribe(self: &Arc<Self>, recipient: &str) -> Subscription {
        let (channel, receiver) = BufferedChannel::new(self.channel_buffer);
        let id = channel.id();

        if let Err(e) = self.register(recipient, Arc::new(channel)) {
            tracing::warn!(
                recipient = %recipient,
                error = %e,
                "Subscription opened without registration"
            );
        }

        Subscription {
            id,
            recipient: recipient.to_string(),
            receiver,
            hub: Arc::clone(self),
            closed: false,
        }
    }

    /// Register a transport-supplied channel after acknowledging it.
    pub fn register(
        &self,
        recipient: &str,
        channel: Arc<dyn PushChannel>,
    ) -> Result<(), ChannelError> {
        channel.send(&PushMessage::connected(recipient))?;

        let id = channel.id();
        self.channels
            .entry(recipient.to_string())
            .or_default()
            .push(channel);
        self.observer.channel_opened();

        tracing::debug!(
            recipient = %recipient,
            channel_id = %id,
            "Registered notification channel"
        );
        Ok(())
    }

    pub fn unregister(&self, recipient: &str, channel_id: ChannelId) -> bool {
        self.close_channel(recipient, channel_id, ChannelCloseReason::Completed)
    }

    /// Remove a channel in response to a lifecycle signal. Returns false if
    /// the channel was already gone.
    pub fn close_channel(
        &self,
        recipient: &str,
        channel_id: ChannelId,
        reason: ChannelCloseReason,
    ) -> bool {
        let removed = match self.channels.entry(recipient.to_string()) {
            Entry::Occupied(mut entry) => {
                let before = entry.get().len();
                entry.get_mut().retain(|channel| channel.id() != channel_id);
                let removed = entry.get().len() != before;
                if entry.get().is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        };

        if removed {
            self.observer.channel_closed(reason);
            tracing::debug!(
                recipient = %recipient,
                channel_id = %channel_id,
                reason = reason.as_str(),
                "Unregistered notification channel"
            );
        }
        removed
    }

    /// Write `message` to every channel currently open for `recipient`.
    pub fn publish(&self, recipient: &str, message: &PushMessage) -> DeliveryReport {
        let snapshot = match self.channels.get(recipient) {
            Some(channels) => channels.value().clone(),
            None => {
                tracing::debug!(
                    recipient = %recipient,
                    event = %message.event,
                    "No open channels for recipient"
                );
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport::default();
        for channel in snapshot {
            match channel.send(message) {
                Ok(()) => {
                    report.delivered += 1;
                    self.observer.push_delivered();
                }
                Err(e) => {
                    report.failed += 1;
                    self.observer.push_failed();
                    tracing::warn!(
                        recipient = %recipient,
                        channel_id = %channel.id(),
                        error = %e,
                        "Push failed, dropping channel"
                    );
                    self.close_channel(recipient, channel.id(), ChannelCloseReason::WriteFailed);
                }
            }
        }

        tracing::debug!(
            recipient = %recipient,
            event = %message.event,
            delivered = report.delivered,
            failed = report.failed,
            "Published notification"
        );
        report
    }

    pub fn channel_count(&self, recipient: &str) -> usize {
        self.channels.get(recipient).map(|c| c.len()).unwrap_or(0)
    }

    pub fn recipient_count(&self) -> usize {
        self.channels.len()
    }

    pub fn open_channel_count(&self) -> usize {
        self.channels.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Receiving end of a channel opened with [`NotificationHub::subscribe`].
///
/// The transport forwards received messages to its client and reports the
/// connection's end through `complete`, `timed_out` or `errored`. Dropping
/// the handle unregisters it as well.
pub struct Subscription {
    id: ChannelId,
    recipient: String,
    receiver: mpsc::Receiver<PushMessage>,
    hub: Arc<NotificationHub>,
    closed: bool,
}

impl Subscription {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub async fn recv(&mut self) -> Option<PushMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PushMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn complete(mut self) {
        self.close(ChannelCloseReason::Completed);
    }

    pub fn timed_out(mut self) {
        self.close(ChannelCloseReason::TimedOut);
    }

    pub fn errored(mut self) {
        self.close(ChannelCloseReason::Errored);
    }

    fn close(&mut self, reason: ChannelCloseReason) {
        if !self.closed {
            self.closed = true;
            self.hub.close_channel(&self.recipient, self.id, reason);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close(ChannelCloseReason::Dropped);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::metrics::{Metrics, NoopObserver};
    use crate::notifications::payload::{StatusUpdate, CONNECTED_EVENT};
    use uuid::Uuid;

    struct FailingChannel {
        id: ChannelId,
        fail_after_ack: bool,
    }

    impl PushChannel for FailingChannel {
        fn id(&self) -> ChannelId {
            self.id
        }

        fn send(&self, message: &PushMessage) -> Result<(), ChannelError> {
            if self.fail_after_ack && message.event == CONNECTED_EVENT {
                return Ok(());
            }
            Err(ChannelError::Transport {
                id: self.id,
                reason: "connection reset".to_string(),
            })
        }
    }

    fn test_hub() -> Arc<NotificationHub> {
        Arc::new(NotificationHub::new(8, Arc::new(NoopObserver)))
    }

    fn status_message(recipient: &str) -> PushMessage {
        PushMessage::status_update(&StatusUpdate {
            order_id: Uuid::new_v4(),
            status: OrderStatus::Ready,
            recipient: recipient.to_string(),
        })
    }

    #[test]
    fn test_subscribe_sends_connected_ack() {
        let hub = test_hub();
        let mut subscription = hub.subscribe("ada@example.com");

        let ack = subscription.try_recv().unwrap();
        assert_eq!(ack.event, CONNECTED_EVENT);
        assert_eq!(ack.data["recipient"], "ada@example.com");
        assert_eq!(hub.channel_count("ada@example.com"), 1);
        assert_eq!(subscription.recipient(), "ada@example.com");
    }

    #[test]
    fn test_publish_without_channels_is_noop() {
        let hub = test_hub();
        let report = hub.publish("nobody@example.com", &status_message("nobody@example.com"));

        assert_eq!(report, DeliveryReport::default());
        assert_eq!(hub.recipient_count(), 0);
    }

    #[test]
    fn test_failing_channel_removed_healthy_channel_delivered() {
        let hub = test_hub();
        let recipient = "ada@example.com";
        let mut healthy = hub.subscribe(recipient);
        hub.register(
            recipient,
            Arc::new(FailingChannel {
                id: Uuid::new_v4(),
                fail_after_ack: true,
            }),
        )
        .unwrap();
        assert_eq!(hub.channel_count(recipient), 2);

        let message = status_message(recipient);
        let report = hub.publish(recipient, &message);

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 1 });
        assert_eq!(hub.channel_count(recipient), 1);

        healthy.try_recv().unwrap(); // ack
        assert_eq!(healthy.try_recv(), Some(message));
    }

    #[test]
    fn test_register_rejects_channel_that_fails_ack() {
        let hub = test_hub();
        let result = hub.register(
            "ada@example.com",
            Arc::new(FailingChannel {
                id: Uuid::new_v4(),
                fail_after_ack: false,
            }),
        );

        assert!(result.is_err());
        assert_eq!(hub.recipient_count(), 0);
    }

    #[test]
    fn test_full_buffer_counts_as_failure() {
        let hub = Arc::new(NotificationHub::new(1, Arc::new(NoopObserver)));
        let recipient = "slow@example.com";
        let _slow = hub.subscribe(recipient); // ack fills the single slot

        let report = hub.publish(recipient, &status_message(recipient));
        assert_eq!(report, DeliveryReport { delivered: 0, failed: 1 });
        assert_eq!(hub.recipient_count(), 0);
    }

    #[test]
    fn test_unregister_removes_empty_recipient() {
        let hub = test_hub();
        let first = hub.subscribe("ada@example.com");
        let second = hub.subscribe("ada@example.com");
        let first_id = first.id();

        assert!(hub.unregister("ada@example.com", first_id));
        assert!(!hub.unregister("ada@example.com", first_id));
        assert_eq!(hub.channel_count("ada@example.com"), 1);
        assert_eq!(hub.open_channel_count(), 1);

        second.complete();
        assert_eq!(hub.recipient_count(), 0);
        drop(first);
        assert_eq!(hub.recipient_count(), 0);
    }

    #[test]
    fn test_lifecycle_signals_unregister() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let hub = Arc::new(NotificationHub::new(8, metrics.clone()));

        let a = hub.subscribe("ada@example.com");
        let b = hub.subscribe("ada@example.com");
        let c = hub.subscribe("grace@example.com");
        assert_eq!(metrics.channels_open.get(), 3);

        a.timed_out();
        b.errored();
        drop(c);

        assert_eq!(hub.recipient_count(), 0);
        assert_eq!(metrics.channels_open.get(), 0);
        assert_eq!(
            metrics.channels_closed.with_label_values(&["timeout"]).get(),
            1
        );
        assert_eq!(
            metrics.channels_closed.with_label_values(&["dropped"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_for_distinct_recipients() {
        let hub = test_hub();

        let mut handles = Vec::new();
        for n in 0..16 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                let recipient = format!("user-{}@example.com", n);
                let mut subscription = hub.subscribe(&recipient);
                let message = status_message(&recipient);
                let report = hub.publish(&recipient, &message);
                subscription.recv().await; // ack
                let received = subscription.recv().await;
                (report, received == Some(message))
            }));
        }

        for handle in handles {
            let (report, received) = handle.await.unwrap();
            assert_eq!(report.delivered, 1);
            assert!(received);
        }
        assert_eq!(hub.recipient_count(), 0);
    }
}
