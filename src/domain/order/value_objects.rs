use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Monetary summary of an order, in minor currency units.
///
/// Pricing happens upstream; these values are carried through untouched.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoneySummary {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

impl MoneySummary {
    pub fn new(subtotal: i64, discount: i64, total: i64) -> Self {
        Self { subtotal, discount, total }
    }
}

/// Fulfillment stage of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Rejected,
    ];

    /// Stable wire code, also used as the stored column value.
    pub fn code(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Position on the PENDING..COMPLETED fulfillment chain.
    /// Cancelled and rejected orders sit off the chain.
    pub fn chain_position(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Preparing => Some(2),
            OrderStatus::Ready => Some(3),
            OrderStatus::Completed => Some(4),
            OrderStatus::Cancelled | OrderStatus::Rejected => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown order status code: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Action a caller requests against an order's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionAction {
    Forward,
    Backward,
    Cancel,
    Reject,
}

impl TransitionAction {
    pub const ALL: [TransitionAction; 4] = [
        TransitionAction::Forward,
        TransitionAction::Backward,
        TransitionAction::Cancel,
        TransitionAction::Reject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Forward => "forward",
            TransitionAction::Backward => "backward",
            TransitionAction::Cancel => "cancel",
            TransitionAction::Reject => "reject",
        }
    }

    /// Cancel is reported as a backward-like move; reject moves ahead.
    pub fn direction(&self) -> TransitionDirection {
        match self {
            TransitionAction::Forward | TransitionAction::Reject => TransitionDirection::Forward,
            TransitionAction::Backward | TransitionAction::Cancel => TransitionDirection::Backward,
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDirection {
    Forward,
    Backward,
}

impl fmt::Display for TransitionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionDirection::Forward => f.write_str("forward"),
            TransitionDirection::Backward => f.write_str("backward"),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
