//! Operator notifications.
//!
//! Delivery is fire-and-forget: events are queued and sent by a
//! background task, failures are logged and never retried.

mod discord;
mod sender;

pub use discord::DiscordWebhook;
pub use sender::*;
