//! Typed notifications raised on workflow transitions.
//!
//! Each event renders into a mail message and a JSON payload for the in-app
//! inbox. Services hand the result to a [`NotificationOutbox`]; delivery is
//! fire-and-forget.

mod message;
mod outbox;

pub use message::{
    compose, ApplicationContext, MailAction, MailMessage, Notification, NotificationEvent,
};
pub use outbox::{NotificationOutbox, OutboxError};

pub(crate) use outbox::dispatch;
