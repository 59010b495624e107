// ============================================================================
// Notifications
// ============================================================================
//
// Live status pushes to subscribers:
// - payload:    PushMessage / StatusUpdate wire shapes
// - channel:    PushChannel seam and the bounded BufferedChannel
// - hub:        NotificationHub registry + fan-out, Subscription handles
// - notifier:   StatusNotifier seam, HubNotifier (owner lookup + publish)
// - dispatcher: kameo actor that runs HubNotifier off the transition path
//
// ============================================================================

mod channel;
mod dispatcher;
mod hub;
mod notifier;
mod payload;

pub use channel::{BufferedChannel, ChannelError, ChannelId, PushChannel};
pub use dispatcher::{
    DispatchingNotifier, GetDispatchedCount, NotificationDispatcher, StatusChanged,
};
pub use hub::{DeliveryReport, NotificationHub, Subscription};
pub use notifier::{HubNotifier, StatusNotifier};
pub use payload::{PushMessage, StatusUpdate, CONNECTED_EVENT, STATUS_EVENT};
