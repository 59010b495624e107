use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderStatus;

/// Event name of the acknowledgement sent when a channel opens.
pub const CONNECTED_EVENT: &str = "connected";

/// Event name of an order status update.
pub const STATUS_EVENT: &str = "order-status";

/// Body of an `order-status` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub recipient: String,
}

/// One named message written to a push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub event: String,
    pub data: serde_json::Value,
}

impl PushMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn connected(recipient: &str) -> Self {
        Self::new(CONNECTED_EVENT, serde_json::json!({ "recipient": recipient }))
    }

    pub fn status_update(update: &StatusUpdate) -> Self {
        Self::new(
            STATUS_EVENT,
            serde_json::json!({
                "order_id": update.order_id,
                "status": update.status,
                "recipient": update.recipient,
            }),
        )
    }

    /// Parse the body back into a status update, if this is one.
    pub fn as_status_update(&self) -> Option<StatusUpdate> {
        if self.event != STATUS_EVENT {
            return None;
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}
