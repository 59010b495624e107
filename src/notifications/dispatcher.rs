use async_trait::async_trait;
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::Actor;

use super::notifier::{HubNotifier, StatusNotifier};
use crate::domain::order::Order;

// ============================================================================
// Notification Dispatcher Actor
// ============================================================================
//
// Moves fan-out off the transition path: the order service tells the actor
// about a committed status change and returns immediately, dropping the push
// when the mailbox is full. Messages are handled in mailbox order, so pushes
// for one order keep their sequence.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub struct StatusChanged {
    pub order: Order,
}

#[derive(Debug)]
pub struct GetDispatchedCount;

// ============================================================================
// Dispatcher Actor
// ============================================================================

pub struct NotificationDispatcher {
    notifier: HubNotifier,
    dispatched: u64,
}

impl NotificationDispatcher {
    pub fn new(notifier: HubNotifier) -> Self {
        Self {
            notifier,
            dispatched: 0,
        }
    }
}

impl Actor for NotificationDispatcher {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("NotificationDispatcher started");
        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<StatusChanged> for NotificationDispatcher {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: StatusChanged,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.notifier.notify_status_change(&msg.order).await;
        self.dispatched += 1;
    }
}

impl Message<GetDispatchedCount> for NotificationDispatcher {
    type Reply = u64;

    async fn handle(
        &mut self,
        _msg: GetDispatchedCount,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.dispatched
    }
}

/// `StatusNotifier` that hands status changes to a running dispatcher.
#[derive(Clone)]
pub struct DispatchingNotifier {
    dispatcher: ActorRef<NotificationDispatcher>,
}

impl DispatchingNotifier {
    pub fn new(dispatcher: ActorRef<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl StatusNotifier for DispatchingNotifier {
    async fn notify_status_change(&self, order: &Order) {
        // Fire and forget: a full mailbox drops the push instead of waiting
        let sent = self
            .dispatcher
            .tell(StatusChanged { order: order.clone() })
            .try_send();

        if let Err(e) = sent {
            tracing::warn!(
                order_id = %order.id,
                status = %order.status(),
                error = %e,
                "Notification dispatcher busy or stopped, status push dropped"
            );
        }
    }
}
