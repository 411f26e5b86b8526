use tracing::{debug, warn};

use super::message::Notification;

/// Outbound hook for notifications (mail relay, queue, in-app store).
pub trait NotificationOutbox: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), OutboxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Publishes every notification. Failures are logged and never surface to the
/// caller because the transition that raised them is already committed.
pub(crate) fn dispatch<N, I>(outbox: &N, notifications: I)
where
    N: NotificationOutbox + ?Sized,
    I: IntoIterator<Item = Notification>,
{
    for notification in notifications {
        let kind = notification.event;
        let recipient = notification.recipient.clone();
        match outbox.publish(notification) {
            Ok(()) => debug!(kind, %recipient, "notification queued"),
            Err(err) => warn!(kind, %recipient, error = %err, "notification dropped"),
        }
    }
}
