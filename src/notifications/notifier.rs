use async_trait::async_trait;
use std::sync::Arc;

use super::hub::{DeliveryReport, NotificationHub};
use super::payload::{PushMessage, StatusUpdate};
use crate::domain::order::Order;
use crate::metrics::LifecycleObserver;
use crate::store::UserDirectory;

/// Told about every committed transition. Never fails: notification is
/// best-effort and must not turn a committed transition into an error.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify_status_change(&self, order: &Order);
}

/// Resolves the order owner's identity and fans the new status out
/// through the hub.
pub struct HubNotifier {
    hub: Arc<NotificationHub>,
    users: Arc<dyn UserDirectory>,
    observer: Arc<dyn LifecycleObserver>,
}

impl HubNotifier {
    pub fn new(
        hub: Arc<NotificationHub>,
        users: Arc<dyn UserDirectory>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self { hub, users, observer }
    }

    /// Same as `notify_status_change`, returning what was delivered.
    /// `None` when the owner could not be resolved.
    pub async fn deliver(&self, order: &Order) -> Option<DeliveryReport> {
        let recipient = match self.users.contact_identity(order.owner_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                self.observer.owner_unresolved();
                tracing::info!(
                    order_id = %order.id,
                    owner_id = %order.owner_id,
                    "Owner has no contact identity, skipping status push"
                );
                return None;
            }
            Err(e) => {
                self.observer.owner_unresolved();
                tracing::warn!(
                    order_id = %order.id,
                    owner_id = %order.owner_id,
                    error = %e,
                    "Owner lookup failed, skipping status push"
                );
                return None;
            }
        };

        let update = StatusUpdate {
            order_id: order.id,
            status: order.status(),
            recipient: recipient.clone(),
        };
        Some(self.hub.publish(&recipient, &PushMessage::status_update(&update)))
    }
}

#[async_trait]
impl StatusNotifier for HubNotifier {
    async fn notify_status_change(&self, order: &Order) {
        self.deliver(order).await;
    }
}
